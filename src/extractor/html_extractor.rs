//! HTML标签提取器
//! 负责从HTML中提取script-src、meta标签、样式表链接和标签频次

use std::cell::RefCell;
use std::collections::HashMap;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts
};
use markup5ever::interface::Attribute;
use tendril::StrTendril;

use crate::probe::MetaTag;

#[derive(Debug, Default, Clone)]
pub struct HtmlExtractor {
    script_srcs: RefCell<Vec<String>>,
    meta_tags: RefCell<Vec<MetaTag>>,
    stylesheets: RefCell<Vec<String>>,
    tag_counts: RefCell<HashMap<String, u64>>,
}

impl TokenSink for HtmlExtractor {
    type Handle = ();

    fn process_token(&self, token: Token, _line: u64) -> TokenSinkResult<()> {
        if let Token::TagToken(Tag {
            kind: TagKind::StartTag,
            name,
            attrs,
            ..
        }) = token
        {
            *self.tag_counts.borrow_mut().entry(name.to_string()).or_insert(0) += 1;

            match name.as_ref() {
                "script" => self.extract_script_src(&attrs),
                "meta" => self.extract_meta_tag(&attrs),
                "link" => self.extract_stylesheet(&attrs),
                _ => {}
            }
        }
        TokenSinkResult::Continue
    }
}

impl HtmlExtractor {
    /// 创建新的提取器
    pub fn new() -> Self {
        Self::default()
    }

    /// 从HTML字符串提取标签
    pub fn extract(&self, html: &str) -> Self {
        let tokenizer = Tokenizer::new(self.clone(), TokenizerOpts::default());
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from(html));

        let _ = tokenizer.feed(&queue);
        tokenizer.end();

        tokenizer.sink
    }

    /// 提取script-src，内联脚本记为空串（与 DOM 中 script.src 一致）
    fn extract_script_src(&self, attrs: &[Attribute]) {
        let src = attrs
            .iter()
            .find(|attr| attr.name.local.as_ref() == "src")
            .map(|attr| attr.value.to_string())
            .unwrap_or_default();
        self.script_srcs.borrow_mut().push(src);
    }

    /// 提取meta标签
    fn extract_meta_tag(&self, attrs: &[Attribute]) {
        let mut tag = MetaTag::default();

        for attr in attrs {
            match attr.name.local.as_ref() {
                "name" => tag.name = Some(attr.value.to_string()),
                "content" => tag.content = Some(attr.value.to_string()),
                _ => {}
            }
        }

        self.meta_tags.borrow_mut().push(tag);
    }

    /// 提取 `<link rel="stylesheet" href>`
    fn extract_stylesheet(&self, attrs: &[Attribute]) {
        let mut is_stylesheet = false;
        let mut href = None;

        for attr in attrs {
            match attr.name.local.as_ref() {
                "rel" => {
                    is_stylesheet = attr
                        .value
                        .split_whitespace()
                        .any(|rel| rel.eq_ignore_ascii_case("stylesheet"));
                }
                "href" => href = Some(attr.value.to_string()),
                _ => {}
            }
        }

        if let (true, Some(h)) = (is_stylesheet, href) {
            if !h.is_empty() {
                self.stylesheets.borrow_mut().push(h);
            }
        }
    }

    /// 获取提取到的script-src列表
    pub fn get_script_srcs(&self) -> Vec<String> {
        self.script_srcs.borrow().clone()
    }

    /// 获取提取到的meta标签列表
    pub fn get_meta_tags(&self) -> Vec<MetaTag> {
        self.meta_tags.borrow().clone()
    }

    /// 获取样式表链接列表
    pub fn get_stylesheets(&self) -> Vec<String> {
        self.stylesheets.borrow().clone()
    }

    /// 获取标签频次表
    pub fn get_tag_counts(&self) -> HashMap<String, u64> {
        self.tag_counts.borrow().clone()
    }
}
