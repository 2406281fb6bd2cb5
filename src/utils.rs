use std::time::Duration;

const SECURE_SCHEME: &str = "https://";

/// Prefix `https://` to targets that carry no http(s) scheme.
///
/// ```rust
/// use batch_capture::normalize_target;
///
/// assert_eq!(normalize_target("example.com"), "https://example.com");
/// assert_eq!(normalize_target("http://example.com"), "http://example.com");
/// ```
pub fn normalize_target(target: &str) -> String {
    let target = target.trim();
    let lower = target.to_ascii_lowercase();

    if lower.starts_with("http://") || lower.starts_with("https://") {
        target.to_string()
    } else {
        format!("{SECURE_SCHEME}{target}")
    }
}

/// Host part of a target with the scheme, a leading `www.` and the
/// top-level domain removed.
///
/// Works on the target text as written: case and non-ASCII characters are
/// kept, so `https://www.Bäckerei.de/` yields `Bäckerei`.
pub fn clean_domain(target: &str) -> String {
    let target = target.trim();
    let lower = target.to_ascii_lowercase();

    let without_scheme = ["https://", "http://"]
        .iter()
        .find(|scheme| lower.starts_with(*scheme))
        .map(|scheme| &target[scheme.len()..])
        .unwrap_or(target);

    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();

    // Drop a trailing port.
    let host = match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };

    let host = host.strip_prefix("www.").unwrap_or(host);

    let host = match host.rfind('.') {
        Some(idx) if is_word(&host[idx + 1..]) => &host[..idx],
        _ => host,
    };

    sanitize_filename(host)
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Replace spaces and path separators in a label with underscores.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .collect()
}

/// File stem of the artifact for a (target, label) pair: `<domain>_<label>`.
///
/// ```rust
/// use batch_capture::artifact_stem;
///
/// assert_eq!(
///     artifact_stem("https://www.example-dentist.com/home", "Zapopan, MX"),
///     "example-dentist_Zapopan,_MX",
/// );
/// ```
pub fn artifact_stem(target: &str, label: &str) -> String {
    format!("{}_{}", clean_domain(target), sanitize_label(label))
}

pub fn sanitize_filename(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("example.com"), "https://example.com");
        assert_eq!(normalize_target("  example.com/path "), "https://example.com/path");
        assert_eq!(normalize_target("https://example.com"), "https://example.com");
        assert_eq!(normalize_target("HTTP://example.com"), "HTTP://example.com");
        assert_eq!(normalize_target("localhost:8080"), "https://localhost:8080");
    }

    #[test]
    fn test_clean_domain() {
        assert_eq!(clean_domain("https://www.example-dentist.com/home"), "example-dentist");
        assert_eq!(clean_domain("http://example.org"), "example");
        assert_eq!(clean_domain("www.clinic.net/contact?x=1"), "clinic");
        assert_eq!(clean_domain("https://dental.example.co.uk/"), "dental.example.co");
        assert_eq!(clean_domain("https://example.com:8080/a"), "example");
        assert_eq!(clean_domain("localhost"), "localhost");
    }

    #[test]
    fn test_clean_domain_keeps_target_text() {
        assert_eq!(clean_domain("https://www.bäckerei-müller.de/"), "bäckerei-müller");
        assert_eq!(clean_domain("HTTPS://www.Example-Dentist.COM/Home"), "Example-Dentist");
        assert_eq!(clean_domain("WWW.Clinic.net"), "WWW.Clinic");
        assert_eq!(clean_domain("https://例え.テスト/パス"), "例え");
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("Zapopan, MX"), "Zapopan,_MX");
        assert_eq!(sanitize_label("Dallas/Fort Worth"), "Dallas_Fort_Worth");
        assert_eq!(sanitize_label("a\\b"), "a_b");
    }

    #[test]
    fn test_artifact_stem() {
        assert_eq!(
            artifact_stem("https://www.example-dentist.com/home", "Zapopan, MX"),
            "example-dentist_Zapopan,_MX"
        );
        assert_eq!(artifact_stem("example.com", "Austin"), "example_Austin");
        assert_eq!(
            artifact_stem("https://www.bäckerei-müller.de/", "Köln"),
            "bäckerei-müller_Köln"
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test.txt"), "test.txt");
        assert_eq!(sanitize_filename("test/file.txt"), "test_file.txt");
        assert_eq!(sanitize_filename("test:file?.txt"), "test_file_.txt");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.0s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 1m 5s");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
