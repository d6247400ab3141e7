use std::path::Path;

/// Reads the filenames to download, one per line.
///
/// Lines are trimmed and blank lines skipped; order is preserved.
pub async fn read_file_list(path: &Path) -> std::io::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_file_list(&content))
}

fn parse_file_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn trims_and_skips_blanks() {
        let names = parse_file_list("a.txt\n\n  b.bin  \r\n\t\nc/d.md");
        assert_eq!(names, ["a.txt", "b.bin", "c/d.md"]);
    }

    #[test]
    fn empty_list() {
        assert!(parse_file_list("\n \n").is_empty());
    }

    #[tokio::test]
    async fn reads_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("files.txt");
        std::fs::write(&path, "one.txt\ntwo.txt\n").unwrap();
        assert_eq!(read_file_list(&path).await.unwrap(), ["one.txt", "two.txt"]);
    }

    #[tokio::test]
    async fn missing_list_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(read_file_list(&dir.path().join("nope.txt")).await.is_err());
    }
}
