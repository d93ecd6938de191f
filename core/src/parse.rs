//! Splitting a raw header block into per-hop header maps.
//!
//! The transport writes the headers of every response it received while
//! following redirects one after another, each hop terminated by a blank
//! line. Parsing is purely textual: nothing here interprets header values.

use log::trace;

use crate::http::{HopHeaders, STATUS_KEY};

/// Parse a raw header block into one `HopHeaders` per hop.
///
/// A blank line closes the current hop. A line without a colon is the hop's
/// status line and is stored under `STATUS_KEY`. Repeated names within a hop
/// keep the last value. An empty or blank block yields no hops.
pub fn parse_header_block(block: &str) -> Vec<HopHeaders> {
    let mut hops: Vec<HopHeaders> = Vec::new();
    let mut in_hop = false;

    for line in block.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            in_hop = false;
            continue;
        }
        if !in_hop {
            hops.push(HopHeaders::new());
            in_hop = true;
        }
        let Some(hop) = hops.last_mut() else {
            continue;
        };
        match line.split_once(':') {
            Some((name, value)) => {
                hop.insert(name.to_string(), value.trim().to_string());
            }
            None => {
                hop.insert(STATUS_KEY.to_string(), line.to_string());
            }
        }
    }

    trace!("parsed header block into {} hop(s)", hops.len());
    hops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(pairs: &[(&str, &str)]) -> HopHeaders {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn two_hops_separated_by_blank_line() {
        let block = "HTTP/1.1 301 Moved\r\nLocation: /x\r\n\r\nHTTP/1.1 200 OK\r\nContent-Type: text/html\r\n";
        let hops = parse_header_block(block);
        assert_eq!(
            hops,
            vec![
                hop(&[("status", "HTTP/1.1 301 Moved"), ("Location", "/x")]),
                hop(&[("status", "HTTP/1.1 200 OK"), ("Content-Type", "text/html")]),
            ]
        );
    }

    #[test]
    fn trailing_blank_lines_do_not_create_hops() {
        let block = "HTTP/1.1 200 OK\r\nServer: x\r\n\r\n\r\n";
        let hops = parse_header_block(block);
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0]["Server"], "x");
    }

    #[test]
    fn repeated_name_keeps_last_value_within_hop() {
        let block = "HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\n\r\n";
        let hops = parse_header_block(block);
        assert_eq!(hops[0]["Set-Cookie"], "b=2");
    }

    #[test]
    fn repeated_name_in_different_hops_is_independent() {
        let block = "HTTP/1.1 302 Found\r\nX-Hop: one\r\n\r\nHTTP/1.1 200 OK\r\nX-Hop: two\r\n\r\n";
        let hops = parse_header_block(block);
        assert_eq!(hops[0]["X-Hop"], "one");
        assert_eq!(hops[1]["X-Hop"], "two");
    }

    #[test]
    fn value_is_split_on_first_colon_and_trimmed() {
        let block = "HTTP/1.1 301 Moved\r\nLocation:   http://x.com:8080/a  \r\n";
        let hops = parse_header_block(block);
        assert_eq!(hops[0]["Location"], "http://x.com:8080/a");
    }

    #[test]
    fn name_case_is_preserved() {
        let block = "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\nX-Mixed-Case: 1\r\n";
        let hops = parse_header_block(block);
        assert!(hops[0].contains_key("content-type"));
        assert!(hops[0].contains_key("X-Mixed-Case"));
    }

    #[test]
    fn empty_block_yields_no_hops() {
        assert!(parse_header_block("").is_empty());
        assert!(parse_header_block("\r\n\r\n").is_empty());
    }

    #[test]
    fn lines_without_colon_do_not_panic() {
        let block = "garbage\r\nmore garbage\r\n";
        let hops = parse_header_block(block);
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0][STATUS_KEY], "more garbage");
    }

    #[test]
    fn bare_newlines_are_accepted() {
        let block = "HTTP/1.0 200 OK\nA: 1\n\nHTTP/1.0 200 OK\nB: 2\n";
        let hops = parse_header_block(block);
        assert_eq!(hops.len(), 2);
        assert_eq!(hops[1]["B"], "2");
    }
}
