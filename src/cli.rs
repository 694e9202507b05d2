use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "testinject")]
#[command(version)]
#[command(
    about = "go test -toolexec wrapper that routes tests and subtests through a tracing SDK",
    long_about = "Run as `go test -toolexec=testinject ./...`. Without a tool command, \
                  locates (or downloads) the SDK and prints where it is."
)]
pub struct Cli {
    /// Toolchain command to wrap: the real tool path followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "TOOL ARGS")]
    pub command: Vec<String>,
}
