// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: build file path
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .default_value("shadepack.toml")
        .help("Path to the build file")
}

fn build_cli() -> Command {
    Command::new("shadepack")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Assemble relocated, self-contained agent jars")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("build")
                .about("Build the output jar from a build file")
                .arg(config_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("PATH")
                        .help("Override the output path from the build file"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the build report as JSON"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Validate a build file without building")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("inspect")
                .about("List the entries of a jar")
                .arg(Arg::new("archive").required(true).help("Jar to inspect"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                )
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .value_parser(["class", "resource", "service", "manifest", "other"])
                        .help("Only show entries of this kind"),
                ),
        )
        .subcommand(
            Command::new("relocate")
                .about("Relocate the packages of a single jar")
                .arg(Arg::new("archive").required(true).help("Jar to relocate"))
                .arg(
                    Arg::new("rule")
                        .short('r')
                        .long("rule")
                        .value_name("FROM=TO")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Relocation rule, applied in order"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .required(true)
                        .help("Output jar"),
                ),
        )
        .subcommand(
            Command::new("init")
                .about("Create a starter shadepack.toml")
                .arg(Arg::new("dir").default_value(".").help("Directory for the build file"))
                .arg(
                    Arg::new("main_class")
                        .long("main-class")
                        .default_value("com.example.agent.Agent")
                        .help("Main class of the agent"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite an existing build file"),
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

    let man_path = man_dir.join("shadepack.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
