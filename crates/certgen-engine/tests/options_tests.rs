use certgen_engine::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_save_and_load_options() {
    let options = GenerationOptions {
        placement: PlacementMode::Fit,
        min_font_size: 8.0,
        title: "Graduation 2026".to_string(),
        ..Default::default()
    };

    let temp = NamedTempFile::new().unwrap();
    options.save(temp.path()).await.unwrap();
    let loaded = GenerationOptions::load(temp.path()).await.unwrap();

    assert_eq!(loaded, options);
}

#[tokio::test]
async fn test_load_rejects_invalid_options() {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(br#"{"yieldInterval": 0}"#).unwrap();

    let err = GenerationOptions::load(temp.path()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Config(_)));
}

#[tokio::test]
async fn test_load_rejects_malformed_json() {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(b"{ placement: ").unwrap();

    let err = GenerationOptions::load(temp.path()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Config(_)));
}

#[tokio::test]
async fn test_load_missing_file() {
    let err = GenerationOptions::load("/nonexistent/certgen.json")
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Io(_)));
}

#[test]
fn test_editor_fields_json() {
    let json = r##"[
        {"id":"f1","label":"Name","column":"name","x":148.5,"y":95,"fontSize":32,
         "color":"#1a2b3c","align":"center","maxWidth_mm":180,"minFontSize":12},
        {"id":"f2","label":"Org","column":"","value":"Institute","x":20,"y":200,
         "align":"left","underline":true,"rotation":-5,"letterSpacing":1.5,"enabled":false}
    ]"##;
    let fields: Vec<Field> = serde_json::from_str(json).unwrap();

    assert_eq!(fields[0].bound_column(), Some("name"));
    assert_eq!(fields[0].max_width_mm, Some(180.0));
    assert_eq!(fields[0].min_font_size, Some(12.0));
    assert_eq!(fields[1].bound_column(), None);
    assert_eq!(fields[1].align, Align::Left);
    assert!(!fields[1].enabled);
    assert_eq!(fields[1].resolve_text(&Row::new()), "Institute");
}
