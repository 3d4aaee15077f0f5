//! exsif - self-extracting container launcher.
//!
//! Invoked by the artifact's control script with the artifact's own path,
//! the two byte lengths delimiting the embedded runtime, the expected image
//! checksum, and the arguments to forward to the runtime:
//!
//! ```sh
//! exsif <artifact> <script-len> <runtime-len> <image-checksum> [args...]
//! ```
//!
//! The first invocation spawns a per-user session daemon that owns the
//! shared scratch directory; later concurrent invocations join it. The
//! process exits with the wrapped runtime's exit code.
//!
//! The `__daemon` first argument is internal: it is how a client re-executes
//! this binary as the detached session daemon.

#[cfg(not(unix))]
fn main() {
    eprintln!("exsif requires a Unix host (unix domain sockets)");
    std::process::exit(1);
}

#[cfg(unix)]
fn main() -> std::process::ExitCode {
    unix::main()
}

#[cfg(unix)]
mod unix {
    use exsif::{client, daemon, LaunchParams};
    use std::path::PathBuf;
    use std::process::ExitCode;
    use tracing::{error, info, Level};
    use tracing_subscriber::FmtSubscriber;

    enum Mode {
        /// Foreground client invocation.
        Client(LaunchParams),
        /// Internal: detached session daemon.
        Daemon(LaunchParams),
        Help,
        Version,
    }

    fn parse_args() -> Result<Mode, String> {
        let mut args: Vec<String> = std::env::args().skip(1).collect();

        match args.first().map(String::as_str) {
            None | Some("help") | Some("--help") | Some("-h") => return Ok(Mode::Help),
            Some("version") | Some("--version") | Some("-v") => return Ok(Mode::Version),
            Some("__daemon") => {
                args.remove(0);
                return Ok(Mode::Daemon(parse_launch_params(args, false)?));
            }
            Some(_) => {}
        }

        Ok(Mode::Client(parse_launch_params(args, true)?))
    }

    fn parse_launch_params(args: Vec<String>, forward_rest: bool) -> Result<LaunchParams, String> {
        if args.len() < 4 {
            return Err("expected <artifact> <script-len> <runtime-len> <image-checksum>".into());
        }

        let artifact = PathBuf::from(&args[0]);
        let script_len: u64 = args[1]
            .parse()
            .map_err(|_| format!("invalid script length: {}", args[1]))?;
        let runtime_len: u64 = args[2]
            .parse()
            .map_err(|_| format!("invalid runtime length: {}", args[2]))?;
        let checksum = args[3].clone();
        let runtime_args = if forward_rest {
            args[4..].to_vec()
        } else {
            Vec::new()
        };

        LaunchParams::new(artifact, script_len, runtime_len, checksum, runtime_args)
            .map_err(|e| e.to_string())
    }

    fn init_tracing() {
        let level = std::env::var("EXSIF_LOG")
            .ok()
            .and_then(|v| v.parse::<Level>().ok())
            .unwrap_or(Level::INFO);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_ansi(false)
            .compact()
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("failed to set tracing subscriber");
        }
    }

    pub fn main() -> ExitCode {
        init_tracing();

        let mode = match parse_args() {
            Ok(mode) => mode,
            Err(e) => {
                eprintln!("error: {e}");
                print_help();
                return ExitCode::FAILURE;
            }
        };

        match mode {
            Mode::Client(params) => {
                let socket = daemon::control_socket_path();
                match client::run(&socket, &params) {
                    // Forward the runtime's exit code untouched.
                    Ok(code) => std::process::exit(code),
                    Err(e) => {
                        error!("{e}");
                        ExitCode::FAILURE
                    }
                }
            }
            Mode::Daemon(params) => {
                daemon::ignore_sighup();
                info!(pid = std::process::id(), "session daemon starting");
                let socket = daemon::control_socket_path();
                match daemon::run(&socket, &params) {
                    Ok(()) => ExitCode::SUCCESS,
                    Err(e) => {
                        error!("{e}");
                        ExitCode::FAILURE
                    }
                }
            }
            Mode::Version => {
                println!("exsif {}", env!("CARGO_PKG_VERSION"));
                ExitCode::SUCCESS
            }
            Mode::Help => {
                print_help();
                ExitCode::SUCCESS
            }
        }
    }

    fn print_help() {
        println!(
            r#"exsif - self-extracting container launcher

USAGE:
    exsif <artifact> <script-len> <runtime-len> <image-checksum> [args...]

ARGS:
    <artifact>        Path of the self-extracting artifact (its own file)
    <script-len>      Byte length of the leading control-script segment
    <runtime-len>     Byte length of the embedded runtime segment
    <image-checksum>  Expected hex sha256 of the trailing image segment
    [args...]         Forwarded verbatim to the runtime invocation

ENVIRONMENT:
    EXSIF_LOG         Log level (trace, debug, info, warn, error)
"#
        );
    }
}
