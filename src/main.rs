use std::path::PathBuf;
use std::process;

use anstyle::Style;
use clap::Parser;

use gitflow::cli::{Cli, Commands, ConfigCommand, TypeCommand};
use gitflow::commands::{
    ConfigAction, FinishOptions, handle_config, handle_delete, handle_finish, handle_init,
    handle_list, handle_publish, handle_rebase, handle_start, handle_track, handle_update,
};
use gitflow::errors::exit_code;
use gitflow::git::Repository;
use gitflow::styling::eprintln;

fn main() {
    let cli = Cli::parse();

    // Configure logging based on --verbose flag or RUST_LOG env var
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "off" }),
    )
    .format(|buf, record| {
        use std::io::Write;

        let msg = record.args().to_string();
        let dim = Style::new().dimmed();

        // Commands start with $; make only the command bold, not the context
        if let Some(rest) = msg.strip_prefix("$ ") {
            let bold = Style::new().bold();
            if let Some(bracket_pos) = rest.find(" [") {
                let command = &rest[..bracket_pos];
                let context = &rest[bracket_pos..];
                writeln!(buf, "$ {bold}{command}{bold:#}{dim}{context}{dim:#}")
            } else {
                writeln!(buf, "$ {bold}{rest}{bold:#}")
            }
        } else {
            writeln!(buf, "{dim}{msg}{dim:#}")
        }
    })
    .init();

    let result = run(&cli);

    if let Err(e) = result {
        // Error messages are already formatted with emoji and colors
        eprintln!("{e}");
        let code = exit_code(&e).unwrap_or(1);
        process::exit(code);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if let Commands::Version = cli.command {
        println!("git-flow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let base = cli.directory.clone().unwrap_or_else(|| PathBuf::from("."));
    let repo = Repository::discover(base)?;

    match &cli.command {
        Commands::Init { force, defaults } => handle_init(&repo, *force, *defaults),
        Commands::Update { name } => handle_update(&repo, name.as_deref()),
        Commands::Config { action } => {
            let action = match action {
                ConfigCommand::List => ConfigAction::List,
                ConfigCommand::Get { key } => ConfigAction::Get { key: key.clone() },
                ConfigCommand::Set { key, value } => ConfigAction::Set {
                    key: key.clone(),
                    value: value.clone(),
                },
                ConfigCommand::Unset { key } => ConfigAction::Unset { key: key.clone() },
            };
            handle_config(&repo, action)
        }
        Commands::Version => unreachable!("handled above"),
        Commands::Feature { action }
        | Commands::Bugfix { action }
        | Commands::Release { action }
        | Commands::Hotfix { action }
        | Commands::Support { action } => {
            let ty = cli
                .command
                .type_name()
                .expect("typed subcommands have a type name");
            match action {
                TypeCommand::Start { name, base, fetch } => {
                    handle_start(&repo, ty, name, base.as_deref(), *fetch)
                }
                TypeCommand::Finish(args) => {
                    let opts = FinishOptions {
                        resume: args.resume,
                        abort: args.abort,
                        overrides: args.overrides(),
                    };
                    handle_finish(&repo, ty, &args.name, opts)
                }
                TypeCommand::Publish { name } => handle_publish(&repo, ty, name),
                TypeCommand::Track { name } => handle_track(&repo, ty, name),
                TypeCommand::Delete {
                    name,
                    force,
                    remote,
                } => handle_delete(&repo, ty, name, *force, *remote),
                TypeCommand::List { verbose } => handle_list(&repo, ty, *verbose),
                TypeCommand::Rebase {
                    name,
                    preserve_merges,
                } => handle_rebase(&repo, ty, name, *preserve_merges),
            }
        }
    }
}
