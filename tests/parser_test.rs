//! Parser behavior over realistic bulletin fixtures.

use pretty_assertions::assert_eq;
use vigia::parser::{clean_header, is_court_header, parse_bulletin};

const FIXTURE: &str = r#"
<html>
<head><title>BOLETIN JUDICIAL</title></head>
<body>
<div align="center"><b>PODER JUDICIAL DEL ESTADO</b></div>
<div align="center">BOLET&Iacute;N JUDICIAL, 7 DE MARZO DE 2025</div>

<p><b>JUZGADO PRIMERO DE LO CIVIL, QUER&Eacute;TARO, QRO., 7 DE MARZO DE 2025</b></p>
<table border="1">
  <tr><td><b>EXPEDIENTE</b></td><td><b>ACUERDO</b></td></tr>
  <tr><td>342/2025</td><td>SE TIENE POR PRESENTADO ESCRITO DE MAR&Iacute;A PE&Ntilde;A</td></tr>
  <tr><td>SIN NUMERO</td><td>FILA DE CONTINUACION</td></tr>
  <tr><td>7/2024</td><td>AUTO DE RADICACI&Oacute;N</td></tr>
</table>

<p>PEREZ LOPEZ JUAN VS RAMIREZ ORTEGA, JUZGADO QUERETARO 555/2020</p>

<p><b>SALA PENAL, SAN JUAN DEL R&Iacute;O, S.J.R.</b></p>
<table>
  <tr><td>15/2023</td><td>SENTENCIA DEFINITIVA</td></tr>
</table>
</body>
</html>
"#;

#[test]
fn test_fixture_sections_and_entries() {
    let entries = parse_bulletin(FIXTURE);
    assert_eq!(entries.len(), 3);

    assert_eq!(entries[0].court, "JUZGADO PRIMERO DE LO CIVIL, QUERÉTARO");
    assert_eq!(entries[0].case_number, "342/2025");
    assert!(entries[0].detail.contains("MARÍA PEÑA"));

    assert_eq!(entries[1].court, "JUZGADO PRIMERO DE LO CIVIL, QUERÉTARO");
    assert_eq!(entries[1].case_number, "7/2024");

    assert_eq!(entries[2].court, "SALA PENAL, SAN JUAN DEL RÍO");
    assert_eq!(entries[2].case_number, "15/2023");
    assert_eq!(entries[2].detail, "SENTENCIA DEFINITIVA");
}

#[test]
fn test_caption_with_case_number_is_not_a_header() {
    // the caption between the two sections names a court and a place but
    // carries a case-number-shaped substring, so it must not open a section
    assert!(!is_court_header(
        "PEREZ LOPEZ JUAN VS RAMIREZ ORTEGA, JUZGADO QUERETARO 555/2020"
    ));
}

#[test]
fn test_front_matter_is_not_a_header() {
    assert!(!is_court_header("PODER JUDICIAL DEL ESTADO"));
    assert!(!is_court_header("BOLETÍN JUDICIAL, 7 DE MARZO DE 2025"));
}

#[test]
fn test_header_cleanup_matches_fixture() {
    assert_eq!(
        clean_header("JUZGADO PRIMERO DE LO CIVIL, QUERÉTARO, QRO., 7 DE MARZO DE 2025"),
        "JUZGADO PRIMERO DE LO CIVIL, QUERÉTARO"
    );
}

#[test]
fn test_empty_document_yields_nothing() {
    assert!(parse_bulletin("").is_empty());
    assert!(parse_bulletin("<html><body><p>NADA</p></body></html>").is_empty());
}
