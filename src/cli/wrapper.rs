use std::path::Path;

pub const DEFAULT_WRAP_INCLUDE: &str = "run.h";

/// Translation unit that pulls in `header` after `includes`, so qcc can
/// compile a header on its own.
pub fn header_wrapper(header: &Path, includes: &[String]) -> String {
    let header = header.to_string_lossy().replace('\\', "/");
    let defaults = [DEFAULT_WRAP_INCLUDE.to_string()];
    let includes = if includes.is_empty() { &defaults[..] } else { includes };

    let mut lines: Vec<String> = includes
        .iter()
        .map(|include| format!("#include \"{}\"", include))
        .collect();
    lines.push(format!("#include \"{}\"", header));
    lines.push("int main() { return 0; }".to_string());
    lines.join("\n") + "\n"
}
