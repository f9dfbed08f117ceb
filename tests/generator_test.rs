mod common;

#[test]
fn test_generate_commands_csv() {
    let output_path = std::path::PathBuf::from("test_generated.csv");
    common::generate_commands_csv(&output_path, 3, 5).expect("Failed to generate CSV");

    let content = std::fs::read_to_string(&output_path).expect("Failed to read file");
    // Header + passenger + 3 drivers + 5 requests = 10 lines
    assert_eq!(content.lines().count(), 10);

    std::fs::remove_file(output_path).ok();
}

#[test]
fn test_generated_zones_are_known() {
    let output_path = std::path::PathBuf::from("test_zones_generated.csv");
    common::generate_commands_csv(&output_path, 1, 200).expect("Failed to generate CSV");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&output_path)
        .expect("Failed to open CSV");

    let mut seen = std::collections::HashSet::new();
    for result in reader.records() {
        let record = result.expect("Failed to read record");
        if &record[0] != "request_ride" {
            continue;
        }
        assert!(common::ZONES.contains(&&record[3]));
        assert!(common::ZONES.contains(&&record[4]));
        seen.insert(record[3].to_string());
    }

    assert!(seen.len() > 1, "Should have seen more than one origin");

    std::fs::remove_file(output_path).ok();
}
