use stackmap_asm::jvm::class_graph::{ClassGraph, ClassGraphArenas};
use stackmap_asm::jvm::code::{Emission, Listing};
use stackmap_asm::script::{self, ScriptError};

use clap::{crate_version, Arg, ArgAction, Command};
use std::fs;

fn main() -> Result<(), ScriptError> {
    env_logger::init();

    let matches = Command::new("stackmap-asm")
        .version(crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Assembles a JVM routine from a script, computing its stack map frames")
        .arg(
            Arg::new("frames only")
                .long("frames-only")
                .help("Only print labels and their frames")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("INPUT")
                .help("Sets the input script file to use")
                .required(true)
                .index(1),
        )
        .get_matches();

    let frames_only = matches.get_flag("frames only");
    let script_file = matches
        .get_one::<String>("INPUT")
        .map(String::as_str)
        .unwrap_or_default();
    log::info!("Reading '{}'", script_file);
    let source = fs::read_to_string(script_file)?;

    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    let java = class_graph.insert_java_library_types();
    let mut listing = Listing::new();
    let size = script::assemble(&class_graph, &java, &source, &mut listing)?;

    if frames_only {
        for emission in &listing.emissions {
            if !matches!(emission, Emission::Instruction(_)) {
                println!("{}", emission);
            }
        }
        println!("  ; max_stack={} max_locals={}", size.max_stack, size.max_locals);
    } else {
        print!("{}", listing);
    }

    Ok(())
}
