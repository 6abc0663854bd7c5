// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Repeatable option taking one value
fn multi_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(long)
        .value_name("VALUE")
        .action(ArgAction::Append)
        .global(true)
        .help(help)
}

fn path_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).value_name("PATH").global(true).help(help)
}

fn sdk_arg() -> Arg {
    Arg::new("sdk")
        .required(true)
        .help("Platform SDK (iphoneos, iphonesimulator)")
}

fn build_cli() -> Command {
    Command::new("kiln")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Kiln Contributors")
        .about("Cross-compile third-party libraries for mobile device and simulator SDKs")
        .subcommand_required(true)
        .arg(path_arg("workdir", "workdir", "Working directory"))
        .arg(path_arg("builddir", "builddir", "Where recipes are unpacked and built"))
        .arg(path_arg("cachedir", "cachedir", "Where downloads are cached"))
        .arg(path_arg("prefix", "prefix", "Distribution prefix for headers, libraries and build state"))
        .arg(path_arg("recipes_dir", "recipes-dir", "Directory of built-in recipes"))
        .arg(multi_arg("custom_recipes", "custom-recipes", "Additional recipe directory"))
        .arg(multi_arg("cflag", "cflag", "Extra C compiler flag"))
        .arg(multi_arg("cxxflag", "cxxflag", "Extra C++ compiler flag"))
        .arg(multi_arg("include", "include", "Include directory").short('I'))
        .arg(multi_arg("define", "define", "Preprocessor define, NAME or NAME=VALUE").short('D'))
        .arg(multi_arg("ldflag", "ldflag", "Library search directory").short('L'))
        .arg(multi_arg("ldlib", "ldlib", "Library to link"))
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .global(true)
                .help("Parallel make jobs (default: number of CPUs)"),
        )
        .arg(
            Arg::new("no_ccache")
                .long("no-ccache")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Do not route compilers through ccache"),
        )
        .arg(
            Arg::new("dedup_flags")
                .long("dedup-flags")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Drop repeated flags when merging flag sets"),
        )
        .arg(path_arg("config", "config", "Config file"))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("More output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::Count)
                .global(true)
                .help("Less output"),
        )
        .subcommand(
            Command::new("recipes").about("List available recipes").arg(
                Arg::new("compact")
                    .long("compact")
                    .action(ArgAction::SetTrue)
                    .help("Print every recipe name on one line"),
            ),
        )
        .subcommand(
            Command::new("deps")
                .about("Show the dependency tree of a recipe")
                .arg(Arg::new("target").required(true).help("Recipe name, optionally name==version")),
        )
        .subcommand(Command::new("info").about("Show the resolved context, SDKs and supported architectures"))
        .subcommand(
            Command::new("build-info")
                .about("Print the build environment derived for an architecture")
                .arg(sdk_arg())
                .arg(Arg::new("arch").required(true).help("CPU architecture (arm64, x86_64)")),
        )
        .subcommand(Command::new("status").about("Show which recipes are built"))
        .subcommand(
            Command::new("build")
                .about("Build recipes and their dependencies")
                .arg(sdk_arg())
                .arg(
                    Arg::new("archs")
                        .required(true)
                        .num_args(1..)
                        .help("CPU architectures to build for"),
                )
                .arg(
                    Arg::new("recipe")
                        .short('r')
                        .long("recipe")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Recipe to build"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Rebuild even if already built"),
                ),
        )
        .subcommand(
            Command::new("clean")
                .about("Forget the build state of a recipe")
                .arg(Arg::new("recipe").required(true).help("Recipe name"))
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Drop every state entry and the build directory"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=src/cli");
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=OUT_DIR not set: {}", e);
            return;
        }
    };

    if let Err(e) = fs::create_dir_all(&out_dir) {
        println!("cargo:warning=Failed to create {}: {}", out_dir.display(), e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = out_dir.join("kiln.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
