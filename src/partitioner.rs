use std::collections::HashSet;

/// Candidate partition locations for every year in `start_year..=end_year`.
///
/// Upstream partitions were written both as `year=2019/` and as
/// `year=2019.0/`, so each year yields both forms, integer form first.
/// Nothing here checks which of them exists.
pub fn locate(base_location: &str, start_year: i32, end_year: i32) -> Vec<String> {
    let mut locations = Vec::new();

    for year in start_year..=end_year {
        locations.push(format!("{base_location}year={year}/"));
        locations.push(format!("{base_location}year={year}.0/"));
    }

    locations
}

/// Directory name of a candidate relative to its base, e.g. `year=2019.0`.
pub fn partition_dir<'a>(base_location: &str, location: &'a str) -> &'a str {
    location
        .strip_prefix(base_location)
        .unwrap_or(location)
        .trim_matches('/')
}

/// Keeps only the candidates whose directory was found by listing the base.
pub fn retain_existing(
    base_location: &str,
    candidates: Vec<String>,
    existing_dirs: &HashSet<String>,
) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|loc| existing_dirs.contains(partition_dir(base_location, loc)))
        .collect()
}
