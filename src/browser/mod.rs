//! 浏览器适配层
//!
//! - `connection`：连接到已启动的浏览器（调试端口）
//! - `launch`：用持久化的用户目录启动浏览器
//! - `workspace`：在已登录的页面中创建项目、导入页面

pub mod connection;
pub mod launch;
pub mod workspace;

pub use connection::connect_to_browser_and_page;
pub use launch::launch_browser;
pub use workspace::{BrowserWikiConnector, BrowserWorkspace};
