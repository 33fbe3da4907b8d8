//! Progress bar and summary reporting for CLI downloads.

use std::sync::OnceLock;
use std::time::Duration;

use console::style;
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};

use crate::progress::ProgressSink;
use crate::session::DownloadOutcome;
use crate::stats::TransferStats;
use crate::tree::{FolderTree, NodeId};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% - {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╌")
}

/// A progress sink drawing a single percentage bar.
///
/// The bar is created on first use and reused by every later operation.
#[derive(Default)]
pub struct BarProgress {
    bar: OnceLock<ProgressBar>,
}

impl BarProgress {
    pub const fn new() -> Self {
        Self {
            bar: OnceLock::new(),
        }
    }

    fn bar(&self) -> &ProgressBar {
        self.bar.get_or_init(|| {
            let bar = ProgressBar::new(100);
            bar.set_style(bar_style());
            bar
        })
    }
}

impl ProgressSink for BarProgress {
    fn on_begin(&self, label: &str) {
        let bar = self.bar();
        bar.reset();
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
    }

    fn on_percent(&self, percent: u8) {
        self.bar().set_position(u64::from(percent));
    }

    fn on_item_error(&self, name: &str, error: &str) {
        self.bar()
            .println(format!("  {} {name}: {error}", style("skipped").yellow()));
    }

    fn on_finish(&self) {
        let bar = self.bar();
        bar.disable_steady_tick();
        bar.finish();
    }
}

/// Prints the tree of loaded folders with their file counts.
pub fn print_tree(tree: &FolderTree) {
    fn walk(tree: &FolderTree, id: NodeId, depth: usize) {
        let Some(node) = tree.get(id) else { return };
        let name = if depth == 0 { "/" } else { node.name.as_str() };
        let indent = "  ".repeat(depth);
        let detail = if let Some(error) = &node.error {
            style(format!("(unavailable: {error})")).red().to_string()
        } else if node.loaded {
            style(format!("({} file(s))", node.files.len())).dim().to_string()
        } else {
            style("(not loaded)").dim().to_string()
        };
        println!("{indent}{} {detail}", style(name).bold());
        for &child in &node.children {
            walk(tree, child, depth + 1);
        }
    }

    walk(tree, tree.root(), 0);
}

/// Prints the subfolders and files of one folder.
pub fn print_listing(tree: &FolderTree, id: NodeId) {
    let Some(node) = tree.get(id) else { return };

    println!("\n{SEPARATOR}");
    println!("{}", style(&node.path).bold());
    println!("{SEPARATOR}");
    for &child in &node.children {
        if let Some(child) = tree.get(child) {
            println!("  {}/", style(&child.name).cyan());
        }
    }
    for file in &node.files {
        println!("  {}", file.name);
    }
    println!("{SEPARATOR}");
    println!(
        "  {} folder(s), {} file(s)",
        node.children.len(),
        node.files.len()
    );
    println!("{SEPARATOR}\n");
}

fn print_stats(stats: &TransferStats) {
    println!("  Files saved:       {} of {}", stats.succeeded, stats.attempted);
    println!("  Total size:        {}", HumanBytes(stats.total_bytes));
    println!("  Total time:        {}", HumanDuration(stats.elapsed));
    println!(
        "  Average speed:     {}/s",
        HumanBytes(stats.average_speed())
    );
    for name in &stats.failed {
        println!("  {} {name}", style("failed:").red());
    }
}

/// Prints a summary of a finished download.
pub fn print_summary(outcome: &DownloadOutcome) {
    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");

    match outcome {
        DownloadOutcome::Prebuilt { url, path, size } => {
            println!("  Pre-built archive: {url}");
            println!("  Saved to:          {}", path.display());
            println!("  Size:              {}", HumanBytes(*size));
        }
        DownloadOutcome::Built { path, stats, .. } => {
            println!("  Archive:           {}", path.display());
            print_stats(stats);
        }
        DownloadOutcome::Sequential { reason, stats, .. } => {
            println!("  No archive built:  {reason}");
            print_stats(stats);
        }
    }

    println!("{SEPARATOR}");
}
