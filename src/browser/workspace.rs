//! 浏览器中的 Cosense 工作区
//!
//! 在已登录的浏览器页面中创建项目、导入页面。
//! 所有请求都在页面内用 `fetch(..., { credentials: 'include' })` 发出，
//! 不需要在程序中持有任何 cookie。

use crate::browser::{connect_to_browser_and_page, launch_browser};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{BatchConfig, JsExecutor, RateLimitedBatcher};
use crate::models::{Page, Project};
use crate::services::ports::{PageImporter, ProjectCreator, WikiConnector, WikiPorts};
use async_trait::async_trait;
use chromiumoxide::Browser;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// 创建项目后等待跳转的最长时间
const CREATE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ProjectStatus {
    status: u16,
}

/// 浏览器工作区
///
/// 职责：
/// - 持有 Browser 与 JsExecutor
/// - 创建（或复用）项目
/// - 分批导入页面
pub struct BrowserWorkspace {
    _browser: Browser,
    executor: JsExecutor,
    base_url: String,
    batch_size: usize,
    batch_delay: Duration,
}

impl BrowserWorkspace {
    /// 连接（配置了调试端口时）或启动浏览器，并打开 Cosense 首页
    pub async fn open(config: &Config) -> AppResult<Self> {
        let base_url = config.cosense_base_url.trim_end_matches('/').to_string();
        let home = format!("{}/", base_url);

        let (browser, page) = match config.browser_debug_port {
            Some(port) => connect_to_browser_and_page(port, &home).await?,
            None => launch_browser(&config.browser_profile_dir, &home).await?,
        };

        Ok(Self {
            _browser: browser,
            executor: JsExecutor::new(page),
            base_url,
            batch_size: config.import_batch_size.max(1),
            batch_delay: config.import_batch_delay(),
        })
    }

    /// 项目是否已存在（当前登录用户可见）
    async fn project_exists(&self, project_name: &str) -> AppResult<bool> {
        let js_code = format!(
            r#"
            (async () => {{
                const res = await fetch('/api/projects/' + encodeURIComponent({name}), {{
                    credentials: 'include'
                }});
                return {{ status: res.status }};
            }})()
            "#,
            name = serde_json::to_string(project_name)?
        );
        let status: ProjectStatus = self.executor.eval_as(js_code).await?;
        debug!("项目 {} 查询状态: {}", project_name, status.status);
        Ok(status.status == 200)
    }

    /// 确保当前页面位于 Cosense 域名下（相对路径的 fetch 依赖它）
    async fn ensure_on_cosense(&self) -> AppResult<()> {
        let on_cosense = self
            .executor
            .current_url()
            .await?
            .is_some_and(|url| url.starts_with(&self.base_url));
        if !on_cosense {
            self.executor.goto(&format!("{}/", self.base_url)).await?;
        }
        Ok(())
    }

    /// 在页面内导入一批页面
    async fn import_chunk(&self, project_name: &str, pages: &[Page]) -> AppResult<()> {
        let payload = serde_json::to_string(&json!({ "pages": pages }))?;
        let js_code = format!(
            r#"
            (async () => {{
                try {{
                    const me = await fetch('/api/users/me', {{ credentials: 'include' }});
                    const {{ csrfToken }} = await me.json();

                    const form = new FormData();
                    const file = new Blob([JSON.stringify({payload})], {{ type: 'application/octet-stream' }});
                    form.append('import-file', file, 'import.json');
                    form.append('name', 'import.json');

                    const res = await fetch('/api/page-data/import/' + encodeURIComponent({name}) + '.json', {{
                        method: 'POST',
                        credentials: 'include',
                        headers: {{
                            'Accept': 'application/json, text/plain, */*',
                            'X-CSRF-TOKEN': csrfToken
                        }},
                        body: form
                    }});
                    if (!res.ok) {{
                        return {{ ok: false, error: res.status + ' ' + (await res.text()) }};
                    }}
                    return {{ ok: true }};
                }} catch (err) {{
                    return {{ ok: false, error: String(err) }};
                }}
            }})()
            "#,
            payload = payload,
            name = serde_json::to_string(project_name)?
        );

        self.executor.eval_checked(js_code).await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectCreator for BrowserWorkspace {
    async fn create_project(&self, project_name: &str) -> AppResult<String> {
        self.ensure_on_cosense().await?;
        if self.project_exists(project_name).await? {
            info!("♻️ 项目已存在，直接复用: /{}", project_name);
            return Ok(project_name.to_string());
        }

        info!("🆕 正在创建项目: /{}", project_name);
        self.executor
            .goto(&format!("{}/projects/new", self.base_url))
            .await?;

        // 页面由 React 渲染，需要通过原生 setter 触发 input 事件
        let js_code = format!(
            r#"
            (async () => {{
                const name = {name};
                const byLabel = (pattern) => Array.from(document.querySelectorAll('label'))
                    .find(l => pattern.test(l.textContent || ''));
                const input = document.querySelector('input[name="name"]')
                    || (byLabel(/Project URL/i) && byLabel(/Project URL/i).querySelector('input'));
                if (!input) {{
                    return {{ ok: false, error: 'project name input not found' }};
                }}
                const setter = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set;
                setter.call(input, name);
                input.dispatchEvent(new Event('input', {{ bubbles: true }}));

                for (const pattern of [/Private Project/i, /Personal/i, /gyazo\.com/i]) {{
                    const label = byLabel(pattern);
                    const radio = label && label.querySelector('input[type="radio"]');
                    if (radio) radio.click();
                }}

                const button = Array.from(document.querySelectorAll('button'))
                    .find(b => /^\s*Create\s*$/i.test(b.textContent || ''));
                if (!button) {{
                    return {{ ok: false, error: 'create button not found' }};
                }}
                button.click();
                return {{ ok: true }};
            }})()
            "#,
            name = serde_json::to_string(project_name)?
        );
        self.executor.eval_checked(js_code).await?;

        let project_url = format!("{}/{}", self.base_url, project_name);
        self.executor
            .wait_for_url(
                &project_url,
                |url| url.starts_with(&project_url),
                CREATE_TIMEOUT,
            )
            .await?;

        info!("✓ 项目已创建: {}/", project_url);
        Ok(project_name.to_string())
    }
}

#[async_trait]
impl PageImporter for BrowserWorkspace {
    async fn import_pages(&self, project_name: &str, project: &Project) -> AppResult<()> {
        self.ensure_on_cosense().await?;

        let chunks: Vec<&[Page]> = project.pages.chunks(self.batch_size).collect();
        info!(
            "📤 通过浏览器导入 /{}: {} 页，分 {} 批",
            project_name,
            project.pages.len(),
            chunks.len()
        );

        let batcher = RateLimitedBatcher::new(
            format!("导入 /{}", project_name),
            BatchConfig::with_concurrency(1).batched(1, Some(self.batch_delay)),
        );
        let run = batcher
            .run(chunks, |_, pages| self.import_chunk(project_name, pages))
            .await;

        match run.outcomes.into_iter().find_map(|o| o.result.err()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// 在导入阶段需要时才打开浏览器
///
/// 项目总是在浏览器中创建；`api_importer` 存在时页面通过 API 导入，否则也在浏览器中导入
pub struct BrowserWikiConnector {
    config: Config,
    api_importer: Option<Arc<dyn PageImporter>>,
}

impl BrowserWikiConnector {
    pub fn new(config: Config, api_importer: Option<Arc<dyn PageImporter>>) -> Self {
        Self {
            config,
            api_importer,
        }
    }
}

#[async_trait]
impl WikiConnector for BrowserWikiConnector {
    async fn connect(&self) -> AppResult<WikiPorts> {
        let workspace = Arc::new(BrowserWorkspace::open(&self.config).await?);
        let importer: Arc<dyn PageImporter> = match &self.api_importer {
            Some(api) => api.clone(),
            None => workspace.clone(),
        };
        Ok(WikiPorts {
            creator: workspace,
            importer,
        })
    }
}
