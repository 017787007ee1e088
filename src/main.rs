mod checks;
mod commands;
mod core;
mod registry;
mod release;

use clap::Parser;
use core::error::{PublishError, print_error};
use tracing_subscriber::EnvFilter;

/// Publish changed packages to a registry and push a flattened release commit
#[derive(Parser)]
#[command(name = "stable-publish")]
#[command(version, about, long_about = None)]
#[command(styles = get_styles())]
struct Cli {
  #[command(flatten)]
  publish: commands::PublishArgs,

  /// Log registry and git commands (RUST_LOG overrides)
  #[arg(short, long, global = true)]
  verbose: bool,
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "stable_publish=debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  if let Err(err) = commands::run_publish(&cli.publish) {
    handle_error(err);
  }
}

fn handle_error(err: PublishError) -> ! {
  tracing::error!(exit_code = err.exit_code().as_i32(), "{}", err);
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
