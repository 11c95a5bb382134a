use campaign_analytics::error::DashboardError;
use campaign_analytics::loader::load_records;
use campaign_analytics::record::Column;
use chrono::NaiveDate;
use std::io::Write;
use tempfile::{Builder, NamedTempFile};

const HEADER: &str = "Dia;Nome da campanha;Nome do conjunto de anúncios;Nome do anúncio;Status de veiculação;Tipo de resultado;Impressões;Cliques no link;Valor usado (BRL);Resultados;Frequência";

fn csv_file(content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn semicolon_csv_with_decimal_commas() {
    let file = csv_file(&format!(
        "{}\n\
         01/03/2024;Alpha;Set A;Ad 1;active;Leads;1500;12;R$ 25,40;3;1,25\n\
         2024-03-02;Alpha;Set A;Ad 1;active;;800;4;10,60;;\n",
        HEADER
    ));

    let table = load_records(file.path()).unwrap();
    assert_eq!(table.len(), 2);
    assert!(!table.has_column(Column::AgeBracket));

    let first = &table.records[0];
    assert_eq!(first.day, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    assert_eq!(first.impressions, Some(1500.0));
    assert_eq!(first.amount_spent, Some(25.4));
    assert_eq!(first.frequency, Some(1.25));

    let second = &table.records[1];
    assert_eq!(second.result_type, None);
    assert_eq!(second.results, None);
    assert_eq!(second.amount_spent, Some(10.6));
}

#[test]
fn audience_columns_are_picked_up() {
    let file = csv_file(&format!(
        "{};Idade;Gênero\n2024-03-01;Alpha;Set A;Ad 1;active;Leads;100;1;1;1;1;25-34;female\n",
        HEADER
    ));

    let table = load_records(file.path()).unwrap();
    assert!(table.has_column(Column::AgeBracket));
    assert!(table.has_column(Column::Gender));
    assert_eq!(table.records[0].age_bracket.as_deref(), Some("25-34"));
    assert_eq!(table.records[0].gender.as_deref(), Some("female"));
}

#[test]
fn missing_header_names_the_column() {
    let header = HEADER.replace(";Cliques no link", "");
    let file = csv_file(&format!(
        "{}\n2024-03-01;Alpha;Set A;Ad 1;active;Leads;100;1;1;1\n",
        header
    ));

    match load_records(file.path()) {
        Err(DashboardError::MissingColumn { column }) => assert_eq!(column, "Cliques no link"),
        other => panic!("expected missing column, got {:?}", other),
    }
}

#[test]
fn malformed_number_is_a_parse_error() {
    let file = csv_file(&format!(
        "{}\n2024-03-01;Alpha;Set A;Ad 1;active;Leads;lots;1;1;1;1\n",
        HEADER
    ));

    let err = load_records(file.path()).unwrap_err();
    assert!(matches!(err, DashboardError::Parse(_)));
    assert!(err.to_string().contains("Impressões"));
}

#[test]
fn blank_rows_are_skipped() {
    let file = csv_file(&format!(
        "{}\n;;;;;;;;;;\n2024-03-01;Alpha;Set A;Ad 1;active;Leads;100;1;1;1;1\n",
        HEADER
    ));

    let table = load_records(file.path()).unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn unsupported_extension_is_rejected() {
    let mut file = Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(file, "{}", HEADER).unwrap();

    assert!(matches!(
        load_records(file.path()),
        Err(DashboardError::Parse(_))
    ));
}

#[test]
fn non_finite_and_negative_measures_are_parse_errors() {
    for bad in ["NaN", "inf", "-infinity", "-5"] {
        let file = csv_file(&format!(
            "{}\n2024-03-01;Alpha;Set A;Ad 1;active;Leads;100;{};1;1;1\n\
             2024-03-02;Alpha;Set A;Ad 1;active;Leads;100;1;1;1;1\n",
            HEADER, bad
        ));

        match load_records(file.path()) {
            Err(DashboardError::Parse(message)) => {
                assert!(message.contains("Cliques no link"), "{}", message)
            }
            other => panic!("expected parse error for {:?}, got {:?}", bad, other),
        }
    }
}

#[cfg(feature = "web")]
mod workbook {
    use super::*;
    use rust_xlsxwriter::{Format, Workbook};

    fn xlsx_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn workbook_with_dates_numbers_and_audience() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");

        let headers = HEADER.split(';').chain(["Idade", "Gênero"]);
        for (c, header) in headers.enumerate() {
            sheet.write_string(0, c as u16, header).unwrap();
        }

        // Row 1: native date cell (serial for 2024-03-01).
        sheet
            .write_number_with_format(1, 0, 45352.0, &date_format)
            .unwrap();
        // Row 2: date written as text.
        sheet.write_string(2, 0, "02/03/2024").unwrap();

        for row in [1u32, 2] {
            for (c, text) in ["Alpha", "Set A", "Ad 1", "active", "Leads"]
                .into_iter()
                .enumerate()
            {
                sheet.write_string(row, (c + 1) as u16, text).unwrap();
            }
            for (c, value) in [1000.0, 20.0, 5.5, 2.0, 1.2].into_iter().enumerate() {
                sheet.write_number(row, (c + 6) as u16, value).unwrap();
            }
            sheet.write_string(row, 11, "25-34").unwrap();
            sheet.write_string(row, 12, "female").unwrap();
        }

        let file = xlsx_file(&workbook.save_to_buffer().unwrap());
        let table = load_records(file.path()).unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.has_column(Column::AgeBracket));
        assert!(table.has_column(Column::Gender));

        let first = &table.records[0];
        assert_eq!(first.day, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(first.impressions, Some(1000.0));
        assert_eq!(first.amount_spent, Some(5.5));
        assert_eq!(first.age_bracket.as_deref(), Some("25-34"));
        assert_eq!(first.gender.as_deref(), Some("female"));

        let second = &table.records[1];
        assert_eq!(second.day, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(second.frequency, Some(1.2));
    }

    #[test]
    fn negative_workbook_number_is_a_parse_error() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (c, header) in HEADER.split(';').enumerate() {
            sheet.write_string(0, c as u16, header).unwrap();
        }
        sheet.write_string(1, 0, "2024-03-01").unwrap();
        for (c, text) in ["Alpha", "Set A", "Ad 1", "active", "Leads"]
            .into_iter()
            .enumerate()
        {
            sheet.write_string(1, (c + 1) as u16, text).unwrap();
        }
        for (c, value) in [1000.0, 20.0, -5.5, 2.0, 1.2].into_iter().enumerate() {
            sheet.write_number(1, (c + 6) as u16, value).unwrap();
        }

        let file = xlsx_file(&workbook.save_to_buffer().unwrap());
        let err = load_records(file.path()).unwrap_err();
        assert!(matches!(err, DashboardError::Parse(_)));
        assert!(err.to_string().contains("Valor usado (BRL)"));
    }

    #[test]
    fn empty_workbook_sheet_is_a_parse_error() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet();

        let file = xlsx_file(&workbook.save_to_buffer().unwrap());
        assert!(matches!(
            load_records(file.path()),
            Err(DashboardError::Parse(_))
        ));
    }
}
