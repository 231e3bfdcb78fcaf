//
// main.rs
//
// Entry point for the just-lsp language server
//

use std::env;

fn print_usage() {
    println!(
        "just-lsp {}, a language server for justfiles.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: just-lsp [OPTIONS]

Available options:

--stdio                      Start the LSP server using stdio transport
--version                    Print the version
--help                       Print this help message

Logging goes to stderr and is controlled by RUST_LOG (for example RUST_LOG=debug).

"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name

    let mut use_stdio = false;

    for arg in argv {
        match arg.as_str() {
            "--stdio" => use_stdio = true,
            "--version" => {
                println!("just-lsp {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_usage();
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("Unknown argument: '{other}'"));
            }
        }
    }

    if !use_stdio {
        print_usage();
        return Ok(());
    }

    env_logger::init();

    just_lsp::backend::start_lsp().await
}
