use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Parser, Subcommand, ValueEnum};
use multichain::SessionMode;

use crate::output::OutputFormat;

/// Session bookkeeping mode (CLI wrapper for multichain::SessionMode)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CliSessionMode {
	/// One session, addressed by the default key
	Single,
	/// Any number of sessions, keyed by session id
	#[default]
	Multi,
}

impl From<CliSessionMode> for SessionMode {
	fn from(mode: CliSessionMode) -> Self {
		match mode {
			CliSessionMode::Single => SessionMode::Single,
			CliSessionMode::Multi => SessionMode::Multi,
		}
	}
}

#[derive(Parser, Debug)]
#[command(name = "mc")]
#[command(about = "Multichain wallet client - Session management from the command line")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: json (default), ndjson, or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	/// Wallet program speaking framed JSON-RPC on stdin/stdout
	#[arg(long, global = true, value_name = "PROGRAM", env = "MC_WALLET")]
	pub wallet: Option<PathBuf>,

	/// Argument passed to the wallet program (repeatable)
	#[arg(long = "wallet-arg", global = true, value_name = "ARG", action = clap::ArgAction::Append, allow_hyphen_values = true)]
	pub wallet_args: Vec<String>,

	/// Session bookkeeping mode
	#[arg(long, global = true, value_enum, default_value = "multi")]
	pub mode: CliSessionMode,

	/// Per-request timeout in milliseconds
	#[arg(long, global = true, value_name = "MS")]
	pub timeout_ms: Option<u64>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Ask the wallet for a new session over one scope
	#[command(alias = "create")]
	CreateSession {
		/// CAIP-2 scope, e.g. eip155:1
		#[arg(long, value_name = "SCOPE")]
		scope: String,

		/// Method to request (repeatable)
		#[arg(long = "method", value_name = "METHOD", action = clap::ArgAction::Append)]
		methods: Vec<String>,

		/// CAIP-10 account to request (repeatable)
		#[arg(long = "account", value_name = "ACCOUNT", action = clap::ArgAction::Append)]
		accounts: Vec<String>,
	},

	/// Fetch the wallet's view of a session
	#[command(alias = "get")]
	GetSession {
		#[arg(long, value_name = "ID")]
		session_id: Option<String>,
	},

	/// Revoke a session
	#[command(alias = "revoke")]
	RevokeSession {
		#[arg(long, value_name = "ID")]
		session_id: Option<String>,
	},

	/// Call a method inside a granted scope
	Invoke {
		#[arg(long, value_name = "SCOPE")]
		scope: String,

		#[arg(long, value_name = "METHOD")]
		method: String,

		/// JSON params for the method
		#[arg(long, value_name = "JSON")]
		params: Option<String>,
	},

	/// Print session changes and wallet notifications as they arrive
	Listen {
		/// Stop after this many events
		#[arg(long, value_name = "N")]
		count: Option<usize>,
	},
}

impl Commands {
	/// Name used in the result envelope.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::CreateSession { .. } => "create-session",
			Commands::GetSession { .. } => "get-session",
			Commands::RevokeSession { .. } => "revoke-session",
			Commands::Invoke { .. } => "invoke",
			Commands::Listen { .. } => "listen",
		}
	}
}

/// Help colors matching cargo's.
fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_create_session() {
		let cli = Cli::try_parse_from([
			"mc",
			"--wallet",
			"./wallet",
			"create-session",
			"--scope",
			"eip155:1",
			"--method",
			"eth_call",
			"--method",
			"eth_chainId",
			"--account",
			"eip155:1:0xabc",
		])
		.unwrap();

		assert_eq!(cli.wallet, Some(PathBuf::from("./wallet")));
		assert_eq!(cli.mode, CliSessionMode::Multi);
		match cli.command {
			Commands::CreateSession {
				scope,
				methods,
				accounts,
			} => {
				assert_eq!(scope, "eip155:1");
				assert_eq!(methods, vec!["eth_call", "eth_chainId"]);
				assert_eq!(accounts, vec!["eip155:1:0xabc"]);
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn global_flags_after_subcommand() {
		let cli = Cli::try_parse_from([
			"mc",
			"get",
			"--wallet",
			"node",
			"--wallet-arg",
			"wallet.js",
			"--wallet-arg",
			"--port=9000",
			"--mode",
			"single",
			"-vv",
			"-f",
			"ndjson",
		])
		.unwrap();

		assert_eq!(cli.wallet_args, vec!["wallet.js", "--port=9000"]);
		assert_eq!(cli.mode, CliSessionMode::Single);
		assert_eq!(SessionMode::from(cli.mode), SessionMode::Single);
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.format, OutputFormat::Ndjson);
		assert_eq!(cli.command.name(), "get-session");
	}

	#[test]
	fn invoke_requires_scope_and_method() {
		assert!(Cli::try_parse_from(["mc", "invoke", "--scope", "eip155:1"]).is_err());

		let cli = Cli::try_parse_from([
			"mc",
			"invoke",
			"--scope",
			"eip155:1",
			"--method",
			"eth_getBalance",
			"--params",
			r#"["0xabc","latest"]"#,
		])
		.unwrap();
		match cli.command {
			Commands::Invoke { params, .. } => assert_eq!(params.as_deref(), Some(r#"["0xabc","latest"]"#)),
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn unknown_mode_is_rejected() {
		assert!(Cli::try_parse_from(["mc", "--mode", "many", "listen"]).is_err());
	}
}
