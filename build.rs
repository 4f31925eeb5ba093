// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: package container path
fn package_arg() -> Arg {
    Arg::new("package")
        .required(true)
        .value_name("PACKAGE")
        .help("Package container, or its file name inside the packages directory")
}

fn build_cli() -> Command {
    Command::new("fomm")
        .version(env!("CARGO_PKG_VERSION"))
        .author("FOMM Contributors")
        .about("Mod package manager with a precise install ledger")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file (defaults apply without one)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("info")
                .about("Show a package's metadata and state")
                .arg(package_arg()),
        )
        .subcommand(
            Command::new("activate")
                .about("Activate a package")
                .arg(package_arg()),
        )
        .subcommand(
            Command::new("deactivate")
                .about("Deactivate a package")
                .arg(package_arg()),
        )
        .subcommand(
            Command::new("build")
                .about("Build a package from files, directories and archive entries")
                .arg(
                    Arg::new("out")
                        .short('o')
                        .long("out")
                        .required(true)
                        .value_name("PATH")
                        .help("Output package path"),
                )
                .arg(Arg::new("name").long("name").help("Package name (defaults to the output file name)"))
                .arg(Arg::new("author").long("author").help("Package author"))
                .arg(Arg::new("pkg_version").long("pkg-version").help("Display version"))
                .arg(
                    Arg::new("sources")
                        .required(true)
                        .num_args(1..)
                        .help("Files, directories or archive:// entries added at the top level"),
                ),
        )
        .subcommand(Command::new("list").about("List the packages in the packages directory"))
        .subcommand(
            Command::new("ledger")
                .about("Load the install ledger (migrating it if needed) and list its mods"),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("fomm.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
