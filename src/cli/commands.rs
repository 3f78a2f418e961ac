//! Command dispatch and handlers

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::debug;

use crate::application::services::{
    LoadedDescriptor, LoaderService, RenderService, Severity, ValidationService,
};
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::DomainError;
use crate::infrastructure::traits::{EnvSource, FileSystem, RealEnv, RealFileSystem};
use crate::util::path::expand_path;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let project_dir = resolve_project_dir(cli)?;
    let settings = Settings::load(Some(&project_dir))?;
    debug!("project_dir: {}", project_dir.display());

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let env: Arc<dyn EnvSource> = Arc::new(RealEnv);
    let loader = LoaderService::new(Arc::clone(&fs), Arc::clone(&env), &settings);

    match &cli.command {
        Some(Commands::Validate { file, strict }) => {
            _validate(&loader, &env, &settings, &project_dir, file.as_deref(), *strict)
        }
        Some(Commands::Render { file }) => {
            _render(&loader, &env, &project_dir, file.as_deref())
        }
        Some(Commands::Env { service, file }) => {
            _env(&loader, &env, &project_dir, service, file.as_deref())
        }
        Some(Commands::Ports { file }) => _ports(&loader, &env, &project_dir, file.as_deref()),
        Some(Commands::Volumes { file }) => {
            _volumes(&loader, &env, &project_dir, file.as_deref())
        }
        Some(Commands::Files { dir }) => _files(&loader, &project_dir, dir.as_deref()),
        Some(Commands::Config { command }) => _config(command, &fs, &settings, &project_dir),
        Some(Commands::Completion { shell }) => {
            generate(*shell, &mut Cli::command(), "rscompose", &mut io::stdout());
            Ok(())
        }
        Some(Commands::Info) => {
            _info();
            Ok(())
        }
        None => Ok(()),
    }
}

fn resolve_project_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.project_dir {
        Some(dir) => Ok(expand_path(dir)),
        None => std::env::current_dir().map_err(|e| {
            CliError::Application(ApplicationError::OperationFailed {
                context: "determine current directory".to_string(),
                source: Box::new(e),
            })
        }),
    }
}

fn load_target(
    loader: &LoaderService,
    project_dir: &Path,
    file: Option<&str>,
) -> CliResult<LoadedDescriptor> {
    let loaded = match file {
        Some(file) => loader.load(&expand_path(file))?,
        None => loader.load_default(project_dir)?,
    };
    Ok(loaded)
}

fn _validate(
    loader: &LoaderService,
    env: &Arc<dyn EnvSource>,
    settings: &Settings,
    project_dir: &Path,
    file: Option<&str>,
    strict_flag: bool,
) -> CliResult<()> {
    let loaded = load_target(loader, project_dir, file)?;
    let validation = ValidationService::new(Arc::clone(env), settings.validation.clone());
    let report = validation.validate(&loaded.file, &loaded.missing_vars)?;

    for issue in &report.issues {
        let line = format!("[{}] {}", issue.check, issue.message);
        match issue.severity {
            Severity::Error => output::failure(&line),
            Severity::Warning => output::warn_item(&line),
        }
    }

    let strict = strict_flag || settings.validation.strict;
    if report.has_errors() || (strict && report.warning_count > 0) {
        return Err(CliError::ValidationFailed {
            errors: report.error_count,
            warnings: report.warning_count,
        });
    }

    if report.is_clean() {
        output::success(&format!("{}: configuration OK", loaded.path.display()));
    } else {
        output::success(&format!(
            "{}: configuration OK ({} warning(s))",
            loaded.path.display(),
            report.warning_count
        ));
    }
    Ok(())
}

fn _render(
    loader: &LoaderService,
    env: &Arc<dyn EnvSource>,
    project_dir: &Path,
    file: Option<&str>,
) -> CliResult<()> {
    let loaded = load_target(loader, project_dir, file)?;
    let render = RenderService::new(Arc::clone(env));
    let yaml = render.to_yaml(&loaded.file)?;
    output::info(yaml.trim_end());
    Ok(())
}

fn _env(
    loader: &LoaderService,
    env: &Arc<dyn EnvSource>,
    project_dir: &Path,
    service: &str,
    file: Option<&str>,
) -> CliResult<()> {
    let loaded = load_target(loader, project_dir, file)?;
    let found = loaded
        .file
        .service(service)
        .ok_or_else(|| ApplicationError::from(DomainError::UnknownService(service.to_string())))?;

    if found.environment.is_empty() {
        output::detail(&format!("service {service}: no environment declared"));
        return Ok(());
    }
    let render = RenderService::new(Arc::clone(env));
    output::info(render.env_exports(found).trim_end());
    Ok(())
}

fn _ports(
    loader: &LoaderService,
    env: &Arc<dyn EnvSource>,
    project_dir: &Path,
    file: Option<&str>,
) -> CliResult<()> {
    let loaded = load_target(loader, project_dir, file)?;
    let render = RenderService::new(Arc::clone(env));
    let lines = render.port_lines(&loaded.file);
    if lines.is_empty() {
        output::detail("no ports declared");
        return Ok(());
    }
    output::header(&format!("{}", loaded.path.display()));
    for line in lines {
        output::info(&line);
    }
    Ok(())
}

fn _volumes(
    loader: &LoaderService,
    env: &Arc<dyn EnvSource>,
    project_dir: &Path,
    file: Option<&str>,
) -> CliResult<()> {
    let loaded = load_target(loader, project_dir, file)?;
    let render = RenderService::new(Arc::clone(env));
    let lines = render.mount_lines(&loaded.file);
    if lines.is_empty() {
        output::detail("no volumes declared");
        return Ok(());
    }
    output::header(&format!("{}", loaded.path.display()));
    for line in lines {
        output::info(&line);
    }
    Ok(())
}

fn _files(loader: &LoaderService, project_dir: &Path, dir: Option<&str>) -> CliResult<()> {
    let dir = match dir {
        Some(dir) => expand_path(dir),
        None => project_dir.to_path_buf(),
    };
    let found = loader.discover(&dir)?;
    if found.is_empty() {
        output::detail(&format!("no descriptor files below {}", dir.display()));
        return Ok(());
    }
    for path in found {
        output::info(&path.display());
    }
    Ok(())
}

fn _config(
    command: &ConfigCommands,
    fs: &Arc<dyn FileSystem>,
    settings: &Settings,
    project_dir: &Path,
) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::info(settings.to_toml()?.trim_end());
            Ok(())
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::InvalidArgs("cannot determine global config directory".to_string())
                })?
            } else {
                local_config_path(project_dir)
            };
            if fs.exists(&path) {
                return Err(CliError::InvalidArgs(format!(
                    "config already exists: {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                fs.create_dir_all(parent)
                    .map_err(|e| ApplicationError::OperationFailed {
                        context: format!("create {}", parent.display()),
                        source: Box::new(e),
                    })?;
            }
            fs.write(&path, &Settings::template()).map_err(|e| {
                ApplicationError::OperationFailed {
                    context: format!("write {}", path.display()),
                    source: Box::new(e),
                }
            })?;
            output::success(&format!("created {}", path.display()));
            Ok(())
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::info(&format!("global: {}", path.display())),
                None => output::info("global: unavailable"),
            }
            output::info(&format!(
                "local:  {}",
                local_config_path(project_dir).display()
            ));
            Ok(())
        }
    }
}

fn _info() {
    if let Some(author) = Cli::command().get_author() {
        println!("AUTHOR: {author}");
    }
    if let Some(version) = Cli::command().get_version() {
        println!("VERSION: {version}");
    }
}
