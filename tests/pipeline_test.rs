use async_trait::async_trait;
use pdf_to_cosense::error::{AppResult, NotFoundError, ToolError};
use pdf_to_cosense::models::{load_project, read_import_marker, read_isbn, BookInfo, Project};
use pdf_to_cosense::services::{
    BookSearch, ImageHost, PageImporter, ProjectCreator, Rasterizer, WikiConnector, WikiPorts,
};
use pdf_to_cosense::{AppError, App, Collaborators, Config, Phase, ShutdownSignal};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ========== 桩实现 ==========

struct StubRasterizer {
    installed: bool,
}

#[async_trait]
impl Rasterizer for StubRasterizer {
    async fn ensure_available(&self) -> AppResult<()> {
        if self.installed {
            Ok(())
        } else {
            Err(ToolError::Missing {
                program: "mutool".into(),
            }
            .into())
        }
    }

    async fn rasterize(&self, _pdf: &Path, out_dir: &Path) -> AppResult<()> {
        std::fs::write(out_dir.join("1.png"), b"png-1")?;
        std::fs::write(out_dir.join("2.png"), b"png-2")?;
        Ok(())
    }
}

/// 第一次调用时请求退出，用来模拟处理途中按下 Ctrl-C
struct InterruptingRasterizer {
    shutdown: ShutdownSignal,
    calls: AtomicUsize,
}

#[async_trait]
impl Rasterizer for InterruptingRasterizer {
    async fn ensure_available(&self) -> AppResult<()> {
        Ok(())
    }

    async fn rasterize(&self, _pdf: &Path, out_dir: &Path) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.shutdown.request();
        std::fs::write(out_dir.join("1.png"), b"png-1")?;
        Ok(())
    }
}

struct StubSearch(Option<&'static str>);

#[async_trait]
impl BookSearch for StubSearch {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search_by_title(&self, title: &str) -> AppResult<BookInfo> {
        match self.0 {
            Some(isbn) => Ok(BookInfo {
                isbn: isbn.to_string(),
                title: title.to_string(),
                authors: vec![],
            }),
            None => Err(NotFoundError::Isbn {
                title: title.to_string(),
            }
            .into()),
        }
    }
}

struct HelloHost;

#[async_trait]
impl ImageHost for HelloHost {
    async fn upload(&self, _bytes: Vec<u8>, filename: &str) -> AppResult<String> {
        Ok(format!("img-{}", filename.trim_end_matches(".png")))
    }

    async fn fetch_ocr(&self, _image_id: &str) -> AppResult<String> {
        Ok("Hello".to_string())
    }
}

#[derive(Default)]
struct RecordingWiki {
    connects: Mutex<usize>,
    imports: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl ProjectCreator for RecordingWiki {
    async fn create_project(&self, project_name: &str) -> AppResult<String> {
        Ok(project_name.to_string())
    }
}

#[async_trait]
impl PageImporter for RecordingWiki {
    async fn import_pages(&self, project_name: &str, project: &Project) -> AppResult<()> {
        self.imports
            .lock()
            .unwrap()
            .push((project_name.to_string(), project.pages.len()));
        Ok(())
    }
}

struct StubConnector(Arc<RecordingWiki>);

#[async_trait]
impl WikiConnector for StubConnector {
    async fn connect(&self) -> AppResult<WikiPorts> {
        *self.0.connects.lock().unwrap() += 1;
        Ok(WikiPorts {
            creator: self.0.clone(),
            importer: self.0.clone(),
        })
    }
}

// ========== 辅助函数 ==========

fn workspace_with_pdf() -> (TempDir, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let ws = tmp.path().join("workspace");
    std::fs::create_dir(&ws).unwrap();
    std::fs::write(ws.join("book.pdf"), b"%PDF-1.7").unwrap();
    (tmp, ws)
}

fn test_config(tmp: &TempDir, ws: &Path) -> Config {
    Config {
        workspace_dir: ws.to_path_buf(),
        gyazo_token: "test-token".into(),
        interactive_isbn: false,
        ocr_quiescence_secs: 0,
        upload_retry_delay_ms: 0,
        ocr_poll_base_delay_ms: 0,
        import_batch_delay_ms: 0,
        output_log_file: tmp.path().join("output.txt").display().to_string(),
        warn_file: tmp.path().join("warn.txt").display().to_string(),
        ..Config::default()
    }
}

fn collaborators(installed: bool, wiki: Option<Arc<RecordingWiki>>) -> Collaborators {
    Collaborators {
        rasterizer: Arc::new(StubRasterizer { installed }),
        image_host: Arc::new(HelloHost),
        book_searches: vec![Arc::new(StubSearch(Some("9784297129148")))],
        isbn_prompt: None,
        profile_source: None,
        wiki: wiki.map(|w| Arc::new(StubConnector(w)) as Arc<dyn WikiConnector>),
    }
}

// ========== 测试 ==========

#[tokio::test]
async fn book_pdf_goes_all_the_way_to_import() {
    let (tmp, ws) = workspace_with_pdf();
    let wiki = Arc::new(RecordingWiki::default());
    let app = App::with_collaborators(
        test_config(&tmp, &ws),
        collaborators(true, Some(wiki.clone())),
        ShutdownSignal::new(),
    );

    let summary = app.run().await.unwrap();

    for phase in Phase::ALL {
        assert_eq!(summary.stats(phase).succeeded, 1, "{}", phase);
    }
    assert!(ws.join("book/1.png").exists());
    assert_eq!(read_isbn(&ws.join("book")).await.unwrap(), "9784297129148");

    let project = load_project(&ws.join("book-ocr.json")).await.unwrap();
    let titles: Vec<&str> = project.pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["0", "1"]);
    for page in &project.pages {
        assert!(page.lines.contains(&"> Hello".to_string()));
    }
    assert_eq!(project.pages[0].lines[3], "[[https://gyazo.com/img-1]]");

    assert_eq!(
        read_import_marker(&ws.join("book")).await.as_deref(),
        Some("book-9784297129148")
    );
    assert_eq!(
        *wiki.imports.lock().unwrap(),
        vec![("book-9784297129148".to_string(), 2)]
    );
}

#[tokio::test]
async fn second_run_does_no_work() {
    let (tmp, ws) = workspace_with_pdf();
    let wiki = Arc::new(RecordingWiki::default());
    let app = App::with_collaborators(
        test_config(&tmp, &ws),
        collaborators(true, Some(wiki.clone())),
        ShutdownSignal::new(),
    );

    app.run().await.unwrap();
    let json_before = std::fs::read_to_string(ws.join("book-ocr.json")).unwrap();

    let summary = app.run().await.unwrap();

    assert_eq!(summary.attempted(), 0);
    for phase in Phase::ALL {
        assert_eq!(summary.stats(phase).pending, 0, "{}", phase);
    }
    // 没有待导入项时不会打开会话
    assert_eq!(*wiki.connects.lock().unwrap(), 1);
    assert_eq!(wiki.imports.lock().unwrap().len(), 1);
    assert_eq!(
        std::fs::read_to_string(ws.join("book-ocr.json")).unwrap(),
        json_before
    );
}

#[tokio::test]
async fn missing_rasterizer_is_fatal() {
    let (tmp, ws) = workspace_with_pdf();
    let app = App::with_collaborators(
        test_config(&tmp, &ws),
        collaborators(false, None),
        ShutdownSignal::new(),
    );

    let err = app.run().await.unwrap_err();

    let app_err = err.downcast_ref::<AppError>().expect("AppError");
    assert!(app_err.is_fatal());
    assert!(!ws.join("book").exists());
}

#[tokio::test]
async fn unknown_book_is_skipped_and_reported() {
    let (tmp, ws) = workspace_with_pdf();
    let mut collab = collaborators(true, None);
    collab.book_searches = vec![Arc::new(StubSearch(None))];
    let config = test_config(&tmp, &ws);
    let warn_file = config.warn_file.clone();
    let app = App::with_collaborators(config, collab, ShutdownSignal::new());

    let summary = app.run().await.unwrap();

    assert_eq!(summary.stats(Phase::ResolveIsbn).skipped, 1);
    assert_eq!(summary.stats(Phase::BuildOcr).pending, 0);
    assert!(!ws.join("book/.isbn").exists());
    let warn = std::fs::read_to_string(warn_file).unwrap();
    assert!(warn.contains("book | 未找到 ISBN"));
}

#[tokio::test]
async fn missing_gyazo_token_stops_before_upload() {
    let (tmp, ws) = workspace_with_pdf();
    let mut config = test_config(&tmp, &ws);
    config.gyazo_token = String::new();
    let app = App::with_collaborators(config, collaborators(true, None), ShutdownSignal::new());

    let err = app.run().await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AppError>(),
        Some(AppError::Config(_))
    ));
    // 前面的阶段已经完成
    assert!(ws.join("book/.isbn").exists());
    assert!(!ws.join("book-ocr.json").exists());
}

#[tokio::test]
async fn disabled_import_leaves_json_pending() {
    let (tmp, ws) = workspace_with_pdf();
    let app = App::with_collaborators(
        test_config(&tmp, &ws),
        collaborators(true, None),
        ShutdownSignal::new(),
    );

    let summary = app.run().await.unwrap();

    assert!(ws.join("book-ocr.json").exists());
    assert_eq!(summary.stats(Phase::Import).pending, 1);
    assert_eq!(summary.stats(Phase::Import).succeeded, 0);
    assert!(read_import_marker(&ws.join("book")).await.is_none());
}

#[tokio::test]
async fn shutdown_before_run_starts_no_phase() {
    let (tmp, ws) = workspace_with_pdf();
    let shutdown = ShutdownSignal::new();
    shutdown.request();
    let app = App::with_collaborators(test_config(&tmp, &ws), collaborators(true, None), shutdown);

    let summary = app.run().await.unwrap();

    assert!(summary.phases.is_empty());
    assert!(!ws.join("book").exists());
}

#[tokio::test]
async fn shutdown_during_phase_stops_remaining_items() {
    let (tmp, ws) = workspace_with_pdf();
    for name in ["b", "c", "d", "e"] {
        std::fs::write(ws.join(format!("{}.pdf", name)), b"%PDF-1.7").unwrap();
    }
    let shutdown = ShutdownSignal::new();
    let rasterizer = Arc::new(InterruptingRasterizer {
        shutdown: shutdown.clone(),
        calls: AtomicUsize::new(0),
    });
    let mut collab = collaborators(true, None);
    collab.rasterizer = rasterizer.clone();
    let config = Config {
        rasterize_concurrency: 1,
        ..test_config(&tmp, &ws)
    };

    let summary = App::with_collaborators(config, collab, shutdown).run().await.unwrap();

    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);
    let stats = summary.stats(Phase::Rasterize);
    assert_eq!(stats.pending, 5);
    assert_eq!(stats.succeeded, 1);
    // 之后的阶段不再开始
    assert_eq!(summary.phases.len(), 1);
}

#[tokio::test]
#[ignore] // 需要网络：cargo test -- --ignored
async fn ndl_lookup_against_live_service() {
    use pdf_to_cosense::clients::{build_http_client, NdlClient};

    let config = Config::from_env();
    let client = NdlClient::new(build_http_client().unwrap(), &config);
    let book = client.search_by_title("実践Rust入門").await.unwrap();
    assert!(!book.isbn.is_empty());
}
