use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::error::{AdapterError, Result};

/// 选择器命中的元素
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    pub text: String,
    pub html: String,
    pub attrs: HashMap<String, String>,
}

impl Element {
    fn from_ref(element: ElementRef<'_>) -> Self {
        let attrs = element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Self {
            text: element.text().collect::<Vec<_>>().join(""),
            html: element.inner_html(),
            attrs,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// 响应体解析出的 HTML 文档
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// 底层的 scraper 文档
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// 使用 CSS 选择器查询多个元素
    pub fn select(&self, selector: &str) -> Result<Vec<Element>> {
        let selector = parse_selector(selector)?;
        Ok(self.html.select(&selector).map(Element::from_ref).collect())
    }

    /// 使用 CSS 选择器查询单个元素
    pub fn first(&self, selector: &str) -> Result<Option<Element>> {
        let selector = parse_selector(selector)?;
        Ok(self.html.select(&selector).next().map(Element::from_ref))
    }

    /// 获取元素属性
    pub fn attr(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        let selector = parse_selector(selector)?;
        Ok(self
            .html
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr(attr).map(|s| s.to_string())))
    }

    /// 获取所有匹配元素的属性
    pub fn attrs(&self, selector: &str, attr: &str) -> Result<Vec<String>> {
        let selector = parse_selector(selector)?;
        Ok(self
            .html
            .select(&selector)
            .filter_map(|el| el.value().attr(attr).map(|s| s.to_string()))
            .collect())
    }

    /// 获取元素文本
    pub fn text(&self, selector: &str) -> Result<Option<String>> {
        let selector = parse_selector(selector)?;
        Ok(self
            .html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join("")))
    }

    /// 获取所有匹配元素的文本
    pub fn texts(&self, selector: &str) -> Result<Vec<String>> {
        let selector = parse_selector(selector)?;
        Ok(self
            .html
            .select(&selector)
            .map(|el| el.text().collect::<Vec<_>>().join(""))
            .collect())
    }

    /// 获取元素内部 HTML
    pub fn inner_html(&self, selector: &str) -> Result<Option<String>> {
        let selector = parse_selector(selector)?;
        Ok(self.html.select(&selector).next().map(|el| el.inner_html()))
    }

    pub fn title(&self) -> Option<String> {
        self.text("title").ok().flatten().map(|t| t.trim().to_string())
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AdapterError::Selector(format!("`{}`: {:?}", selector, e)))
}
