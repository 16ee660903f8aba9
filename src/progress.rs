use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar in the style used by both conversion passes.
pub fn bar(len: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let template = format!(
        "[{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {} ({{eta}} remaining)",
        unit
    );
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}

/// Byte-based variant for streaming over the input file.
pub fn byte_bar(len: u64) -> ProgressBar {
    const TEMPLATE: &str =
        "[{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta} remaining)";
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}
