//! 目录服务（MangaDex API）访问层。
//!
//! - `transport`：HTTP 传输抽象与 reqwest 实现
//! - `retry`    ：可注入的重试策略
//! - `catalog`  ：搜索 / 章节列表 / 页面清单 / 图片
//! - `models`   ：类型化的响应记录

pub mod catalog;
pub mod models;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
