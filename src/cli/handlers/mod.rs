use std::path::Path;

use tracing::debug;

use crate::app::{App, AppError};
use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::remote::Services;
use crate::logging;
use crate::model::config::AppConfig;
use crate::model::task::TaskPath;
use crate::ops::counters;
use crate::ops::index::Target;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), AppError> {
    let json = cli.json;
    let config_path = config_io::config_path(cli.config.as_deref());

    // Config commands work on the file itself and never touch the data dir
    if let Commands::Config(args) = cli.command {
        return cmd_config(args, &config_path, json);
    }

    let config = config_io::read_config(&config_path)?;
    logging::init(&config.log.level);
    let data_dir = config_io::data_dir(&config, cli.data_dir.as_deref());
    debug!(config = %config_path.display(), data_dir = %data_dir.display(), "starting");

    let services = if cli.offline {
        Services::offline()
    } else {
        Services::from_config(&config.remote)?
    };
    let mut app = App::open(config, &data_dir, services)?;

    let result = match cli.command {
        // Read commands
        Commands::List(args) => cmd_list(&app, args, json),
        Commands::Show(args) => cmd_show(&app, args, json),
        Commands::Stats => cmd_stats(&app, json),
        Commands::Whoami => cmd_whoami(&app, json),

        // Write commands
        Commands::Add(args) => cmd_add(&mut app, args, json),
        Commands::Done(args) => cmd_done(&mut app, args, json),
        Commands::Fold(args) => cmd_fold(&mut app, args, json),
        Commands::Rm(args) => cmd_rm(&mut app, args, json),

        // Session
        Commands::Login(args) => cmd_login(&mut app, args, json),
        Commands::Logout => cmd_logout(&mut app, json),
        Commands::Sync(args) => cmd_sync(&mut app, args, json),

        Commands::Config(_) => Ok(()),
    };

    // Queued pushes still go out when a command fails after a local write
    app.close();
    result
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(app: &App, args: ListArgs, json: bool) -> Result<(), AppError> {
    if json {
        print_json(&app.tasks())?;
        return Ok(());
    }
    if app.tasks().is_empty() {
        println!("{}", EMPTY_TREE);
        return Ok(());
    }
    for line in format_tree(app.tasks(), args.all) {
        println!("{}", line);
    }
    println!();
    println!("{}", format_stats(&app.stats()));
    Ok(())
}

fn cmd_show(app: &App, args: TargetArg, json: bool) -> Result<(), AppError> {
    let (path, task) = app.task(&args.target)?;
    if json {
        print_json(&TaskDetailJson {
            path: path.to_string(),
            task,
            stats: counters::stats(&task.subtasks),
        })?;
    } else {
        for line in format_task_detail(task, &path) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_stats(app: &App, json: bool) -> Result<(), AppError> {
    let stats = app.stats();
    if json {
        print_json(&stats)?;
    } else {
        println!("{}", format_stats(&stats));
    }
    Ok(())
}

fn cmd_whoami(app: &App, json: bool) -> Result<(), AppError> {
    if json {
        print_json(&SessionJson {
            user: app.session(),
        })?;
    } else {
        println!("{}", format_user(app.session()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(app: &mut App, args: AddArgs, json: bool) -> Result<(), AppError> {
    let path = app.add_task(&args.text, args.under.as_ref())?;
    let (_, task) = app.task(&Target::Path(path.clone()))?;
    if json {
        print_json(&AddedJson {
            path: path.to_string(),
            id: &task.id,
        })?;
    } else {
        println!("{}", format_task_line(task, &path));
    }
    Ok(())
}

fn cmd_done(app: &mut App, args: TargetArg, json: bool) -> Result<(), AppError> {
    let path = app.toggle_completed(&args.target)?;
    print_changed(app, &path, json)
}

fn cmd_fold(app: &mut App, args: TargetArg, json: bool) -> Result<(), AppError> {
    let path = app.toggle_expanded(&args.target)?;
    print_changed(app, &path, json)
}

fn print_changed(app: &App, path: &TaskPath, json: bool) -> Result<(), AppError> {
    let (_, task) = app.task(&Target::Path(path.clone()))?;
    if json {
        print_json(task)?;
    } else {
        println!("{}", format_task_line(task, path));
    }
    Ok(())
}

fn cmd_rm(app: &mut App, args: TargetArg, json: bool) -> Result<(), AppError> {
    let removed = app.delete_task(&args.target)?;
    if json {
        print_json(&removed)?;
    } else {
        let extra = counters::count_total(&removed.subtasks);
        if extra > 0 {
            println!("deleted {} (and {} subtasks)", removed.text, extra);
        } else {
            println!("deleted {}", removed.text);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

fn cmd_login(app: &mut App, args: LoginArgs, json: bool) -> Result<(), AppError> {
    let user = app.login(&args.email)?.clone();
    if json {
        print_json(&SessionJson { user: Some(&user) })?;
    } else {
        println!("logged in as {}", format_user(Some(&user)));
        println!(
            "loaded {} top-level tasks from {}",
            app.tasks().len(),
            source_name(app.source())
        );
    }
    Ok(())
}

fn cmd_logout(app: &mut App, json: bool) -> Result<(), AppError> {
    let previous = app.logout()?;
    if json {
        print_json(&SessionJson {
            user: previous.as_ref(),
        })?;
    } else {
        match previous {
            Some(user) => println!("logged out {}", user.email),
            None => println!("not logged in"),
        }
    }
    Ok(())
}

fn cmd_sync(app: &mut App, args: SyncCmd, json: bool) -> Result<(), AppError> {
    let source = match args.action {
        SyncAction::Pull => app.pull()?,
        SyncAction::Push => {
            app.push()?;
            app.source()
        }
    };
    let report = SyncJson {
        source: source_name(source),
        roots: app.tasks().len(),
    };
    if json {
        print_json(&report)?;
    } else {
        match args.action {
            SyncAction::Pull => println!(
                "pulled {} top-level tasks from {}",
                report.roots, report.source
            ),
            SyncAction::Push => println!("pushed {} top-level tasks", report.roots),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config(args: ConfigCmd, path: &Path, json: bool) -> Result<(), AppError> {
    match args.action {
        ConfigAction::Show => {
            let config: AppConfig = config_io::read_config(path)?;
            if json {
                print_json(&config)?;
            } else {
                println!("# {}", path.display());
                let text = toml::to_string_pretty(&config)?;
                print!("{}", text);
            }
        }
        ConfigAction::Set(set) => {
            config_io::set_value(path, &set.key, &set.value)?;
            println!("{} = {}", set.key, set.value);
        }
        ConfigAction::Unset(unset) => {
            config_io::unset_value(path, &unset.key)?;
            println!("{} unset", unset.key);
        }
    }
    Ok(())
}
