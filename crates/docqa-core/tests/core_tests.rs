use std::fs;
use tempfile::TempDir;

use docqa_core::config::{Config, EmbeddingProvider, MIN_CONTEXT_CHARS};
use docqa_core::loader::DocumentLoader;
use docqa_core::types::DocumentFormat;
use docqa_core::Error;

#[test]
fn load_dir_reads_text_and_reports_skips_and_failures() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("b.txt"), "bravo").unwrap();
    fs::write(dir.join("nested/a.md"), "# Alpha\n\nbody").unwrap();
    fs::write(dir.join("photo.png"), [0u8, 1, 2]).unwrap();
    fs::write(dir.join("latin1.txt"), [0x63u8, 0x61, 0x66, 0xe9]).unwrap();
    fs::write(dir.join("broken.pdf"), "not really a pdf").unwrap();

    let report = DocumentLoader::new().load_dir(dir).expect("load");

    let ids: Vec<&str> = report.documents.iter().map(|d| d.source_path.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids[0].ends_with("b.txt"));
    assert!(ids[1].ends_with("a.md"));
    assert_eq!(report.documents[1].format, DocumentFormat::Markdown);
    assert_eq!(report.documents[1].metadata.title.as_deref(), Some("a"));

    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].ends_with("photo.png"));

    let failed: Vec<String> =
        report.failures.iter().map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert_eq!(failed, vec!["broken.pdf", "latin1.txt"]);
    assert!(report.failures[1].reason.contains("encoding"));
}

#[test]
fn load_dir_paths_do_not_depend_on_how_the_directory_is_spelled() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("notes.txt"), "Rotate the beds.").unwrap();

    let loader = DocumentLoader::new();
    let direct = loader.load_dir(dir).unwrap();
    let roundabout = loader.load_dir(&dir.join("nested").join("..")).unwrap();
    let ids = |r: &docqa_core::loader::LoadReport| r.documents.iter().map(|d| d.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&direct), ids(&roundabout));
    assert!(std::path::Path::new(&direct.documents[0].source_path).is_absolute());
    assert!(!direct.documents[0].source_path.contains(".."));
}

#[test]
fn load_dir_missing_directory_is_configuration_error() {
    let tmp = TempDir::new().unwrap();
    let err = DocumentLoader::new().load_dir(&tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn load_file_reads_docx_paragraphs() {
    use docx_rs::{Docx, Paragraph, Run};

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("guide.docx");
    let file = fs::File::create(&path).unwrap();
    Docx::new()
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Irrigate at dawn.")))
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Mulch in summer.")))
        .build()
        .pack(file)
        .unwrap();

    let docs = DocumentLoader::new().load_file(&path).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].format, DocumentFormat::Docx);
    assert!(docs[0].raw_text.contains("Irrigate at dawn.\nMulch in summer."));
    assert_eq!(docs[0].id, path.to_string_lossy());
}

fn write_pdf(path: &std::path::Path, pages: &[&str]) {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[test]
fn load_file_reads_pdf_one_document_per_page() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("garlic.pdf");
    write_pdf(&path, &["Plant garlic before frost.", "Harvest when leaves brown."]);

    let docs = DocumentLoader::new().load_file(&path).unwrap();
    assert_eq!(docs.len(), 2);
    let source = path.to_string_lossy();
    assert_eq!(docs[0].id, format!("{source}#page=1"));
    assert_eq!(docs[1].id, format!("{source}#page=2"));
    assert_eq!(docs[0].metadata.page, Some(1));
    assert_eq!(docs[1].metadata.page, Some(2));
    assert!(docs.iter().all(|d| d.format == DocumentFormat::Pdf));
    assert!(docs[0].raw_text.contains("Plant garlic before frost."));
    assert!(docs[1].raw_text.contains("Harvest when leaves brown."));
}

#[test]
fn load_file_reads_spreadsheet_one_document_per_non_empty_sheet() {
    // sheets: Budget, Empty (no rows), Planting
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/homestead.xlsx");

    let docs = DocumentLoader::new().load_file(&path).unwrap();
    let sheets: Vec<Option<&str>> = docs.iter().map(|d| d.metadata.sheet.as_deref()).collect();
    assert_eq!(sheets, vec![Some("Budget"), Some("Planting")]);
    assert!(docs[0].id.ends_with("homestead.xlsx#sheet=Budget"));
    assert!(docs[1].id.ends_with("homestead.xlsx#sheet=Planting"));
    assert!(docs[0].raw_text.contains("Item | Cost"));
    assert!(docs[0].raw_text.contains("Seeds | 12.5"));
    assert!(docs[1].raw_text.contains("Garlic | October"));
    assert!(docs.iter().all(|d| d.format == DocumentFormat::Spreadsheet));
}

#[test]
fn load_file_unsupported_extension() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data.bin");
    fs::write(&path, "x").unwrap();
    assert!(matches!(DocumentLoader::new().load_file(&path), Err(Error::UnsupportedFormat(_))));
}

#[test]
fn config_defaults_without_files() {
    let tmp = TempDir::new().unwrap();
    let settings = Config::load_from(tmp.path(), "none").unwrap().settings().unwrap();
    assert_eq!(settings.chunking.max_size, 1000);
    assert_eq!(settings.chunking.overlap, 200);
    assert_eq!(settings.retrieval.k, 3);
    assert_eq!(settings.embedding.provider, EmbeddingProvider::Ollama);
    assert_eq!(settings.data.table, "chunks");
}

#[test]
fn config_file_and_overlay_merge() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[chunking]\nmax_size = 500\noverlap = 50\n\n[embedding]\nprovider = \"fake\"\ndimension = 64\n",
    )
    .unwrap();
    fs::write(tmp.path().join("config.test.toml"), "[retrieval]\nk = 5\n").unwrap();

    let config = Config::load_from(tmp.path(), "test").unwrap();
    let settings = config.settings().unwrap();
    assert_eq!(settings.chunking.max_size, 500);
    assert_eq!(settings.retrieval.k, 5);
    assert_eq!(settings.embedding.provider, EmbeddingProvider::Fake);
    assert_eq!(config.get::<usize>("embedding.dimension").unwrap(), 64);
}

#[test]
fn config_rejects_overlap_not_below_max_size() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[chunking]\nmax_size = 100\noverlap = 100\n").unwrap();
    let err = Config::load_from(tmp.path(), "none").unwrap().settings().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn config_rejects_context_budget_below_minimum() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[context]\nmax_chars = 10\n").unwrap();
    let err = Config::load_from(tmp.path(), "none").unwrap().settings().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    fs::write(tmp.path().join("config.toml"), format!("[context]\nmax_chars = {MIN_CONTEXT_CHARS}\n")).unwrap();
    assert!(Config::load_from(tmp.path(), "none").unwrap().settings().is_ok());
}
