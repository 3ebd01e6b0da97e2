use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "unv-cli",
    about = "Dump BusinessObjects universe (.unv) metadata as JSON",
    version
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Dump a .unv file (or every .unv under a directory) as JSON
    Dump(DumpArgs),
    /// Print a one-screen summary of a .unv file
    Summary(SummaryArgs),
}

#[derive(ClapArgs, Debug)]
struct DumpArgs {
    /// File or directory to dump
    path: PathBuf,
    /// Include opaque trailer-section summaries in the output
    #[arg(long, default_value_t = false)]
    opaque: bool,
}

#[derive(ClapArgs, Debug)]
struct SummaryArgs {
    /// Universe file to summarize
    path: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Dump(a) => cmd_dump(a),
        Cmd::Summary(a) => cmd_summary(a),
    }
}

fn cmd_dump(args: DumpArgs) {
    let opts = unv_core::json::JsonOpts {
        include_opaque: args.opaque,
    };
    let p = args.path.as_path();
    if p.is_dir() {
        print!("{}", unv_core::json::dump_dir_json(p, opts));
        return;
    }
    match unv_core::json::dump_file_json(p, opts) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }
}

fn cmd_summary(args: SummaryArgs) {
    let u = unv_core::decode_file(&args.path).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(2);
    });
    let p = &u.parameters;
    println!(
        "{} (rev {})",
        p.universe_name.as_deref().unwrap_or("<unnamed>"),
        p.revision
    );
    if let Some(d) = &p.description {
        println!("  {}", d);
    }
    println!(
        "  created {} by {}, modified {} by {}",
        p.created_date,
        p.created_by.as_deref().unwrap_or("?"),
        p.modified_date,
        p.modified_by.as_deref().unwrap_or("?"),
    );
    println!(
        "  tables: {} (+{} virtual), columns: {}, joins: {}",
        u.tables.len(),
        u.virtual_tables.len(),
        u.columns.len(),
        u.joins.len()
    );
    println!(
        "  contexts: {}, links: {}, hierarchies: {}",
        u.contexts.len(),
        u.links.len(),
        u.hierarchies.len()
    );
    println!(
        "  classes: {}, objects: {}, conditions: {}",
        u.class_count(),
        u.object_count(),
        u.condition_count()
    );
    if !u.opaque_sections.is_empty() {
        println!("  opaque sections: {}", u.opaque_sections.len());
    }
}
