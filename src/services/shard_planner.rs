//! Pure partitioning functions for sharded steps.
//!
//! When a step requests parallelism across several leased identities, the
//! decomposer splits its workload here: a port list into balanced chunks,
//! a wordlist into line ranges, or a template catalog into a
//! template x severity matrix.

/// Split `ports` into at most `n` contiguous, balanced chunks.
///
/// If `n >= ports.len()` every port gets its own chunk — the count is
/// capped to the available ports, never padded with empty chunks.
/// Otherwise exactly `n` chunks are produced, the first `len % n` of them
/// one element larger. Input order is preserved.
pub fn split_ports(ports: &[u16], n: usize) -> Vec<Vec<u16>> {
    if n == 0 {
        return Vec::new();
    }
    let total = ports.len();
    if n >= total {
        return ports.iter().map(|p| vec![*p]).collect();
    }
    let (k, m) = (total / n, total % n);
    let mut result = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let end = start + k + usize::from(i < m);
        result.push(ports[start..end].to_vec());
        start = end;
    }
    result
}

/// Split `[0, total_lines - 1]` into at most `n` contiguous inclusive
/// ranges with the same balancing rule as [`split_ports`].
///
/// Used to shard a wordlist file by line number without copying contents.
pub fn split_line_range(total_lines: usize, n: usize) -> Vec<(usize, usize)> {
    if n == 0 || total_lines == 0 {
        return Vec::new();
    }
    let n = n.min(total_lines);
    let (k, m) = (total_lines / n, total_lines % n);
    let mut result = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let len = k + usize::from(i < m);
        result.push((start, start + len - 1));
        start += len;
    }
    result
}

/// Every (template, severity) pair becomes one fixed-size unit of work.
pub fn cross_product(templates: &[String], severities: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(templates.len() * severities.len());
    for template in templates {
        for severity in severities {
            pairs.push((template.clone(), severity.clone()));
        }
    }
    pairs
}

/// Parse a user-facing port spec like `"22,80,1000-1005"` into a sorted,
/// deduplicated list. Malformed parts are skipped.
pub fn parse_port_spec(spec: &str) -> Vec<u16> {
    let mut ports = std::collections::BTreeSet::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.trim().parse::<u16>(), end.trim().parse::<u16>()) {
                for p in start..=end {
                    ports.insert(p);
                }
            }
        } else if let Ok(p) = part.parse::<u16>() {
            ports.insert(p);
        }
    }
    ports.into_iter().collect()
}

/// Render a port chunk back into the comma-separated form tools accept.
pub fn render_port_spec(ports: &[u16]) -> String {
    ports
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
