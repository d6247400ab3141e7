fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use udpfetch_protocol::{Request, Response};

    /// One line of a transcript fixture.
    ///
    /// `C>` lines are requests and `S>` lines responses; a leading `!`
    /// marks a message that must be rejected.
    enum Line {
        Request(String),
        Response(String),
        BadRequest(String),
        BadResponse(String),
    }

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_transcript(name: &str) -> Vec<Line> {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));

        data.lines()
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| {
                let (tag, msg) = l
                    .split_once("> ")
                    .unwrap_or_else(|| panic!("bad fixture line in {name}: {l:?}"));
                let msg = msg.to_string();
                match tag {
                    "C" => Line::Request(msg),
                    "S" => Line::Response(msg),
                    "!C" => Line::BadRequest(msg),
                    "!S" => Line::BadResponse(msg),
                    other => panic!("unknown tag {other:?} in {name}"),
                }
            })
            .collect()
    }

    /// Parses every message and checks it re-encodes byte-identically.
    fn replay(name: &str) -> Vec<(Option<Request>, Option<Response>)> {
        load_transcript(name)
            .into_iter()
            .map(|line| match line {
                Line::Request(msg) => {
                    let req: Request = msg
                        .parse()
                        .unwrap_or_else(|e| panic!("{name}: cannot parse {msg:?}: {e}"));
                    assert_eq!(req.to_bytes(), msg.as_bytes(), "{name}: request re-encoding");
                    (Some(req), None)
                }
                Line::Response(msg) => {
                    let resp: Response = msg
                        .parse()
                        .unwrap_or_else(|e| panic!("{name}: cannot parse {msg:?}: {e}"));
                    assert_eq!(resp.to_bytes(), msg.as_bytes(), "{name}: response re-encoding");
                    (None, Some(resp))
                }
                Line::BadRequest(msg) => {
                    assert!(msg.parse::<Request>().is_err(), "{name}: accepted {msg:?}");
                    (None, None)
                }
                Line::BadResponse(msg) => {
                    assert!(msg.parse::<Response>().is_err(), "{name}: accepted {msg:?}");
                    (None, None)
                }
            })
            .collect()
    }

    /// Checks that chunk replies tile the announced size without gaps.
    fn reassemble(name: &str) -> Vec<u8> {
        let mut size = None;
        let mut body = Vec::new();
        for (_, resp) in replay(name) {
            match resp {
                Some(Response::Ok { size: n, .. }) => size = Some(n),
                Some(Response::Chunk { range, data, .. }) => {
                    assert_eq!(range.start(), body.len() as u64, "{name}: gap before chunk");
                    assert_eq!(range.len(), data.len() as u64, "{name}: short chunk");
                    body.extend_from_slice(&data);
                }
                _ => {}
            }
        }
        assert_eq!(Some(body.len() as u64), size, "{name}: size mismatch");
        body
    }

    #[test]
    fn multi_chunk_session() {
        let body = reassemble("session_multi_chunk.txt");
        let expected: Vec<u8> = (0..2500usize).map(|i| (i * 7 % 256) as u8).collect();
        assert_eq!(body, expected);
    }

    #[test]
    fn empty_file_session() {
        assert!(reassemble("session_empty.txt").is_empty());
    }

    #[test]
    fn keyword_filename_session() {
        assert_eq!(reassemble("session_keyword_name.txt"), b"!");
    }

    #[test]
    fn error_replies() {
        let kinds: Vec<String> = replay("errors.txt")
            .into_iter()
            .filter_map(|(_, resp)| match resp {
                Some(Response::Err { kind, .. }) => Some(kind.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            ["NOT_FOUND", "NOT_A_FILE", "SERVER_FILE_ERROR", "QUOTA_EXCEEDED"]
        );
    }

    #[test]
    fn malformed_messages_rejected() {
        let parsed = replay("malformed.txt");
        assert!(!parsed.is_empty());
        assert!(parsed.iter().all(|(req, resp)| req.is_none() && resp.is_none()));
    }
}
