// File: ./src/cli.rs
//! Shared command-line interface logic, like printing help.

pub fn print_help(binary_name: &str) {
    println!(
        "Tasktable v{} - Offline-first markdown task table with three-way sync",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [--root <path>] [show]", binary_name);
    println!("    {} [--root <path>] export", binary_name);
    println!("    {} [--root <path>] import <tasks.md>", binary_name);
    println!("    {} [--root <path>] sync", binary_name);
    println!("    {} [--root <path>] undo | redo", binary_name);
    println!("    {} diff <old.md> <new.md>", binary_name);
    println!("    {} merge <base.md|-> <local.md> <remote.md>", binary_name);
    println!("    {} --help", binary_name);
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("COMMANDS:");
    println!("    show                  Load tasks (remote first, then local cache) and print them.");
    println!("    export                Print the local task table as markdown.");
    println!("    import <file>         Replace the task list with a markdown table and sync it.");
    println!("    sync                  Three-way merge of local, remote and last synced copy.");
    println!("    undo                  Restore the list as it was before the last import or sync.");
    println!("    redo                  Re-apply the last undone change.");
    println!("    diff <old> <new>      Describe what changed between two task tables.");
    println!("    merge <b> <l> <r>     Merge three tables offline; '-' means no base.");
    println!();
    println!("EXAMPLES:");
    println!(
        "    {} export > backup.md                  Save tasks to file",
        binary_name
    );
    println!(
        "    {} import backup.md                    Restore from a backup",
        binary_name
    );
    println!(
        "    {} merge - mine.md theirs.md           Merge without a common ancestor",
        binary_name
    );
    println!();
    println!("CONFIG:");
    println!("    config.toml keys: user_id, remote_dir, undo_limit, log_level");
    println!("    undo_limit            Number of undo steps kept (default 20).");
    println!();
    println!("MORE INFO:");
    println!("    License:    GPL-3.0");
}
