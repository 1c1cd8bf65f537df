//! Locality file import from disk.

use std::io::Write;

use onacc_forecast::{parse_coordinates, ImportError, LocalityFilter, LocalityTable};

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn test_tab_separated_file_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "localites.tsv",
        "Localite\tLatitude\tLongitude\tAltitude\tRegion\tCountry\n\
         Ngaoundéré\t7.3167\t13.5833\t1104\tAdamaoua\tCameroon\n\
         Ebolowa\t2.9\t11.15\t616\tSud\tCameroon\n",
    );

    let report = LocalityTable::from_path(&path).unwrap();
    assert_eq!(report.table.len(), 2);
    assert!(report.rejected.is_empty());
    assert_eq!(
        report.table.get("Ngaoundéré", "Cameroon").unwrap().altitude(),
        Some(1104.0)
    );
}

#[test]
fn test_workbook_first_sheet_is_imported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("localites.xlsx");

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    let header = ["Localite", "Latitude", "Longitude", "Altitude", "Region", "Country"];
    for (col, name) in header.iter().enumerate() {
        sheet.write_string(0, col as u16, *name).unwrap();
    }
    sheet.write_string(1, 0, "Bafoussam").unwrap();
    sheet.write_number(1, 1, 5.4781).unwrap();
    sheet.write_number(1, 2, 10.4176).unwrap();
    sheet.write_number(1, 3, 1538.0).unwrap();
    sheet.write_string(1, 4, "Ouest").unwrap();
    sheet.write_string(1, 5, "Cameroon").unwrap();
    // No coordinates: skipped, not rejected.
    sheet.write_string(2, 0, "Foumban").unwrap();
    sheet.write_string(2, 4, "Ouest").unwrap();
    sheet.write_string(2, 5, "Cameroon").unwrap();
    sheet.write_string(3, 0, "Kousseri").unwrap();
    sheet.write_number(3, 1, 120.0).unwrap();
    sheet.write_number(3, 2, 15.03).unwrap();
    sheet.write_string(3, 4, "Extrême-Nord").unwrap();
    sheet.write_string(3, 5, "Cameroon").unwrap();
    workbook.save(&path).unwrap();

    let report = LocalityTable::from_path(&path).unwrap();
    assert_eq!(report.table.len(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].line, 4);

    let bafoussam = report.table.get("Bafoussam", "Cameroon").unwrap();
    assert_eq!(bafoussam.latitude(), 5.4781);
    assert_eq!(bafoussam.altitude(), Some(1538.0));
    assert_eq!(bafoussam.region(), "Ouest");
}

#[test]
fn test_missing_columns_are_named() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "bad.csv", "localite,latitude,longitude\nA,1,2\n");

    let err = LocalityTable::from_path(&path).unwrap_err();
    assert!(matches!(err, ImportError::MissingColumns(_)));
    let message = err.to_string();
    assert!(message.contains("altitude"));
    assert!(message.contains("region"));
    assert!(message.contains("country"));
}

#[test]
fn test_select_then_resolve_manual_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "localites.csv",
        "localite,latitude,longitude,altitude,region,country\n\
         Garoua,9.3,13.4,213,Nord,Cameroon\n\
         Maroua,10.5956,14.3247,384,Extrême-Nord,Cameroon\n\
         Moundou,8.5667,16.0833,422,Logone Occidental,Chad\n",
    );
    let table = LocalityTable::from_path(&path).unwrap().table;

    let filter = LocalityFilter {
        countries: ["Cameroon".to_string()].into_iter().collect(),
        ..LocalityFilter::default()
    };
    let names: Vec<String> = table
        .select(&filter)
        .iter()
        .map(|l| l.name().to_string())
        .collect();
    assert_eq!(names, vec!["Garoua", "Maroua"]);

    let pairs = parse_coordinates("8.5667,16.0833, 6.4606,13.1184").unwrap();
    let resolved = table.resolve_coordinates(&pairs).unwrap();
    assert_eq!(resolved[0].name(), "Moundou");
    assert_eq!(resolved[0].country(), "Chad");
    assert_eq!(resolved[1].altitude(), None);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = LocalityTable::from_path(&dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, ImportError::Io(_)));
}
