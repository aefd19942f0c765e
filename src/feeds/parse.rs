//! Pattern-based extraction of news items from RSS and Atom documents.
//!
//! Upstream feeds are third-party and frequently malformed (unclosed tags,
//! stray HTML, undeclared entities), so no strict XML parser is involved.
//! Each `<item>` or `<entry>` block is matched on its own and every field is
//! looked up independently: a field that cannot be found is simply absent.
//!
//! # Dialects
//!
//! | Dialect | Block | Link | Date |
//! |---------|-------|------|------|
//! | RSS 0.9x/1.0/2.0 | `<item>` | `<link>` text | `<pubDate>`, else `<dc:date>` |
//! | Atom | `<entry>` | `<link href>` | `<updated>`, else `<published>` |
//!
//! Atom is only tried when no RSS item could be extracted.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{debug, instrument};
use url::Url;

use crate::models::{FeedSource, NewsItem};
use crate::utils::truncate_for_log;

/// At least one of these must appear, otherwise the body is an HTML error or
/// bot-check page rather than a feed.
const FEED_MARKERS: [&str; 3] = ["<rss", "<feed", "<rdf"];

static ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<item(?:\s[^>]*)?>(.*?)</item>").unwrap());
static ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<entry(?:\s[^>]*)?>(.*?)</entry>").unwrap());

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title(?:\s[^>]*)?>(.*?)</title>").unwrap());
static RSS_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link(?:\s(?:[^>]*[^/>])?)?>(.*?)</link>").unwrap());
static PUB_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pubDate(?:\s[^>]*)?>(.*?)</pubDate>").unwrap());
static DC_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<dc:date(?:\s[^>]*)?>(.*?)</dc:date>").unwrap());
static UPDATED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<updated(?:\s[^>]*)?>(.*?)</updated>").unwrap());
static PUBLISHED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<published(?:\s[^>]*)?>(.*?)</published>").unwrap());

static ATOM_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<link\b([^>]*)>").unwrap());
static ENCLOSURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<enclosure\b([^>]*)>").unwrap());
static MEDIA_CONTENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<media:content\b([^>]*)>").unwrap());
static MEDIA_THUMBNAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<media:thumbnail\b([^>]*)>").unwrap());
static IMG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<img\b([^>]*)>").unwrap());
// <img> inside an entity-escaped description; the attribute scan stops at `&gt;`
static ESCAPED_IMG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)&lt;img\b(?:[^&>]|&[^g]|&g[^t])*?\bsrc\s*=\s*(?:&quot;|&#34;|&#x22;)(.*?)(?:&quot;|&#34;|&#x22;)")
        .unwrap()
});

static HREF_ATTR_RE: Lazy<Regex> = Lazy::new(|| attr_regex("href"));
static REL_ATTR_RE: Lazy<Regex> = Lazy::new(|| attr_regex("rel"));
static URL_ATTR_RE: Lazy<Regex> = Lazy::new(|| attr_regex("url"));
static SRC_ATTR_RE: Lazy<Regex> = Lazy::new(|| attr_regex("src"));

static CDATA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!\[CDATA\[|\]\]>").unwrap());
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z][^>]*>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn attr_regex(name: &str) -> Regex {
    Regex::new(&format!(
        r#"(?is)(?:^|\s){name}\s*=\s*(?:"([^"]*)"|'([^']*)')"#
    ))
    .unwrap()
}

/// Extract news items from a fetched feed body.
///
/// Returns an empty list for anything that does not look like a feed. Items
/// whose title or link is empty after cleanup are dropped.
#[instrument(level = "debug", skip(text), fields(source = %source.name, bytes = text.len()))]
pub fn parse_feed(text: &str, source: &FeedSource) -> Vec<NewsItem> {
    if !looks_like_feed(text) {
        debug!(preview = %truncate_for_log(text, 160), "Body has no feed markers; ignoring");
        return Vec::new();
    }

    let base = Url::parse(&source.url).ok();

    let items: Vec<NewsItem> = ITEM_RE
        .captures_iter(text)
        .filter_map(|caps| rss_item(&caps[1], source, base.as_ref()))
        .collect();
    if !items.is_empty() {
        debug!(count = items.len(), dialect = "rss", "Parsed feed");
        return items;
    }

    let entries: Vec<NewsItem> = ENTRY_RE
        .captures_iter(text)
        .filter_map(|caps| atom_entry(&caps[1], source, base.as_ref()))
        .collect();
    debug!(count = entries.len(), dialect = "atom", "Parsed feed");
    entries
}

fn looks_like_feed(text: &str) -> bool {
    FEED_MARKERS.iter().any(|marker| text.contains(marker))
}

fn rss_item(block: &str, source: &FeedSource, base: Option<&Url>) -> Option<NewsItem> {
    let title = capture(&TITLE_RE, block).map(clean_text)?;
    let link = capture(&RSS_LINK_RE, block).and_then(|raw| clean_url(raw, base))?;
    let published_at = capture(&PUB_DATE_RE, block)
        .or_else(|| capture(&DC_DATE_RE, block))
        .map(clean_text)
        .filter(|date| !date.is_empty());

    build_item(title, link, published_at, block, source, base)
}

fn atom_entry(block: &str, source: &FeedSource, base: Option<&Url>) -> Option<NewsItem> {
    let title = capture(&TITLE_RE, block).map(clean_text)?;
    let link = atom_link(block).and_then(|raw| clean_url(raw, base))?;
    let published_at = capture(&UPDATED_RE, block)
        .or_else(|| capture(&PUBLISHED_RE, block))
        .map(clean_text)
        .filter(|date| !date.is_empty());

    build_item(title, link, published_at, block, source, base)
}

fn build_item(
    title: String,
    link: String,
    published_at: Option<String>,
    block: &str,
    source: &FeedSource,
    base: Option<&Url>,
) -> Option<NewsItem> {
    if title.is_empty() || link.is_empty() {
        return None;
    }
    Some(NewsItem {
        title,
        link,
        source: source.name.clone(),
        published_at,
        image: find_image(block, base),
    })
}

/// The `href` of the entry's alternate link, falling back to any link.
fn atom_link(block: &str) -> Option<&str> {
    let mut fallback = None;
    for caps in ATOM_LINK_RE.captures_iter(block) {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let Some(href) = attr(&HREF_ATTR_RE, attrs) else {
            continue;
        };
        match attr(&REL_ATTR_RE, attrs) {
            None => return Some(href),
            Some(rel) if rel.eq_ignore_ascii_case("alternate") => return Some(href),
            Some(_) => {
                fallback.get_or_insert(href);
            }
        }
    }
    fallback
}

/// First image found, in order: enclosure, media:content, media:thumbnail,
/// inline `<img>`.
fn find_image(block: &str, base: Option<&Url>) -> Option<String> {
    tag_attr(block, &ENCLOSURE_RE, &URL_ATTR_RE)
        .or_else(|| tag_attr(block, &MEDIA_CONTENT_RE, &URL_ATTR_RE))
        .or_else(|| tag_attr(block, &MEDIA_THUMBNAIL_RE, &URL_ATTR_RE))
        .or_else(|| tag_attr(block, &IMG_RE, &SRC_ATTR_RE))
        .or_else(|| capture(&ESCAPED_IMG_RE, block))
        .and_then(|raw| clean_url(raw, base))
}

/// Value of `attribute` on the first `tag` in `block` that carries it.
fn tag_attr<'a>(block: &'a str, tag: &Regex, attribute: &Regex) -> Option<&'a str> {
    tag.captures_iter(block)
        .filter_map(|caps| caps.get(1).and_then(|m| attr(attribute, m.as_str())))
        .next()
}

fn capture<'a>(re: &Regex, haystack: &'a str) -> Option<&'a str> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn attr<'a>(re: &Regex, attrs: &'a str) -> Option<&'a str> {
    re.captures(attrs)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str())
}

/// Title/date cleanup: drop CDATA markers and tags, decode entities, and
/// collapse whitespace.
///
/// Tags are stripped again after decoding because Atom `type="html"` titles
/// carry their markup entity-escaped. A bare `<` that opens no tag is kept.
fn clean_text(raw: &str) -> String {
    let without_cdata = CDATA_RE.replace_all(raw, "");
    let without_tags = TAG_RE.replace_all(&without_cdata, "");
    // a `<` left over here has no closing `>`, so it is text
    let escaped = without_tags.replace('<', "&lt;");
    let decoded: String = Html::parse_fragment(&escaped)
        .root_element()
        .text()
        .collect();
    let plain = TAG_RE.replace_all(&decoded, "");
    WHITESPACE_RE.replace_all(plain.trim(), " ").into_owned()
}

/// Link/image cleanup. Relative URLs are resolved against the feed URL.
/// Anything still holding markup is not a URL.
fn clean_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let without_cdata = CDATA_RE.replace_all(raw, "");
    let trimmed = without_cdata.trim();
    if trimmed.is_empty() || trimmed.contains('<') {
        return None;
    }
    let unescaped = quick_xml::escape::unescape(trimmed).unwrap_or(Cow::Borrowed(trimmed));

    if Url::parse(&unescaped).is_ok() {
        return Some(unescaped.into_owned());
    }
    match base.and_then(|base| base.join(&unescaped).ok()) {
        Some(resolved) => Some(resolved.to_string()),
        None => Some(unescaped.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> FeedSource {
        FeedSource::new("Test Source", "https://news.example.mu/feed/")
    }

    fn rss(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Channel title must be ignored</title>
    <link>https://news.example.mu/</link>
    {items}
  </channel>
</rss>"#
        )
    }

    #[test]
    fn test_rss_items_in_document_order() {
        let text = rss(
            r#"<item>
      <title>Item 1</title>
      <link>https://news.example.mu/1</link>
      <pubDate>Mon, 06 Jan 2025 08:00:00 +0400</pubDate>
    </item>
    <item>
      <title>Item 2</title>
      <link>https://news.example.mu/2</link>
    </item>
    <item>
      <title>Item 3</title>
      <link>https://news.example.mu/3</link>
    </item>"#,
        );

        let items = parse_feed(&text, &source());
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Item 1");
        assert_eq!(items[0].link, "https://news.example.mu/1");
        assert_eq!(items[0].source, "Test Source");
        assert_eq!(
            items[0].published_at.as_deref(),
            Some("Mon, 06 Jan 2025 08:00:00 +0400")
        );
        assert_eq!(items[1].published_at, None);
        assert_eq!(items[2].link, "https://news.example.mu/3");
    }

    #[test]
    fn test_items_missing_title_or_link_are_dropped() {
        let text = rss(
            r#"<item><title>Kept</title><link>https://news.example.mu/kept</link></item>
    <item><link>https://news.example.mu/no-title</link></item>
    <item><title>No link</title></item>
    <item><title><![CDATA[   ]]></title><link>https://news.example.mu/blank</link></item>
    <item><title>Empty link</title><link>  </link></item>"#,
        );

        let items = parse_feed(&text, &source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kept");
    }

    #[test]
    fn test_cdata_tags_and_entities_are_cleaned() {
        let text = rss(
            r#"<item>
      <title><![CDATA[<b>Rentrée</b>   des classes &amp; inscriptions]]></title>
      <link><![CDATA[ https://news.example.mu/a?x=1&amp;y=2 ]]></link>
      <pubDate><![CDATA[Tue, 07 Jan 2025 10:00:00 +0400]]></pubDate>
    </item>"#,
        );

        let items = parse_feed(&text, &source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Rentrée des classes & inscriptions");
        assert_eq!(items[0].link, "https://news.example.mu/a?x=1&y=2");
        assert_eq!(
            items[0].published_at.as_deref(),
            Some("Tue, 07 Jan 2025 10:00:00 +0400")
        );
    }

    #[test]
    fn test_bare_less_than_in_title_is_kept() {
        let text = rss(
            r#"<item>
      <title><![CDATA[Why pupils<teachers ratio matters]]></title>
      <link>https://news.example.mu/ratio</link>
    </item>
    <item>
      <title>x &lt; y</title>
      <link>https://news.example.mu/xy</link>
    </item>"#,
        );

        let items = parse_feed(&text, &source());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Why pupils<teachers ratio matters");
        assert_eq!(items[1].title, "x < y");
    }

    #[test]
    fn test_self_closing_link_is_not_the_item_link() {
        let text = rss(
            r#"<item>
      <link rel="alternate" href="https://news.example.mu/alt"/>
      <title>T</title>
      <link>https://news.example.mu/real</link>
    </item>
    <item>
      <title>Only an atom link</title>
      <atom:link rel="self" href="https://news.example.mu/self"/>
      <link/>
    </item>
    <item>
      <title>Markup in link</title>
      <link><a href="https://news.example.mu/a">https://news.example.mu/a</a></link>
    </item>"#,
        );

        let items = parse_feed(&text, &source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "T");
        assert_eq!(items[0].link, "https://news.example.mu/real");
    }

    #[test]
    fn test_escaped_img_src_stays_inside_img_tag() {
        let text = rss(
            r#"<item>
      <title>Video post</title>
      <link>https://news.example.mu/video</link>
      <description>&lt;img alt=&quot;cover&quot; /&gt;&lt;iframe src=&quot;https://player.example.com/embed/1&quot;&gt;&lt;/iframe&gt;</description>
    </item>
    <item>
      <title>Attributes before src</title>
      <link>https://news.example.mu/photo</link>
      <description>&lt;img alt=&quot;a &amp; b&quot; width=&quot;300&quot; src=&quot;https://img.example.mu/photo.jpg&quot; /&gt;</description>
    </item>"#,
        );

        let items = parse_feed(&text, &source());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].image, None);
        assert_eq!(
            items[1].image.as_deref(),
            Some("https://img.example.mu/photo.jpg")
        );
    }

    #[test]
    fn test_image_priority_order() {
        let text = rss(
            r#"<item>
      <title>All images</title>
      <link>https://news.example.mu/all</link>
      <description><![CDATA[<p><img src="https://img.example.mu/inline.jpg"></p>]]></description>
      <media:thumbnail url="https://img.example.mu/thumb.jpg"/>
      <media:content url="https://img.example.mu/content.jpg" medium="image"/>
      <enclosure url="https://img.example.mu/enclosure.jpg" type="image/jpeg" length="0"/>
    </item>
    <item>
      <title>Media only</title>
      <link>https://news.example.mu/media</link>
      <media:thumbnail url="https://img.example.mu/thumb2.jpg"/>
      <media:content url='https://img.example.mu/content2.jpg'/>
    </item>
    <item>
      <title>Thumbnail only</title>
      <link>https://news.example.mu/thumb</link>
      <media:thumbnail url="https://img.example.mu/thumb3.jpg"/>
    </item>
    <item>
      <title>Inline only</title>
      <link>https://news.example.mu/inline</link>
      <description><![CDATA[<img alt="x" src="/uploads/inline4.jpg">]]></description>
    </item>
    <item>
      <title>Escaped inline</title>
      <link>https://news.example.mu/escaped</link>
      <description>&lt;img src=&quot;https://img.example.mu/escaped.jpg?w=300&amp;h=200&quot; /&gt;</description>
    </item>
    <item>
      <title>No image</title>
      <link>https://news.example.mu/none</link>
    </item>"#,
        );

        let images: Vec<Option<String>> = parse_feed(&text, &source())
            .into_iter()
            .map(|item| item.image)
            .collect();
        assert_eq!(
            images,
            vec![
                Some("https://img.example.mu/enclosure.jpg".to_string()),
                Some("https://img.example.mu/content2.jpg".to_string()),
                Some("https://img.example.mu/thumb3.jpg".to_string()),
                Some("https://news.example.mu/uploads/inline4.jpg".to_string()),
                Some("https://img.example.mu/escaped.jpg?w=300&h=200".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_dc_date_fallback_and_rdf_items() {
        let text = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://gov.example.mu/">
    <title>Portal</title>
    <items><rdf:Seq><rdf:li resource="https://gov.example.mu/n/1"/></rdf:Seq></items>
  </channel>
  <item rdf:about="https://gov.example.mu/n/1">
    <title>Communiqué</title>
    <link>https://gov.example.mu/n/1</link>
    <dc:date>2025-01-06T09:00:00+04:00</dc:date>
  </item>
</rdf:RDF>"#;

        let items = parse_feed(text, &source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Communiqué");
        assert_eq!(
            items[0].published_at.as_deref(),
            Some("2025-01-06T09:00:00+04:00")
        );
    }

    #[test]
    fn test_atom_entries() {
        let text = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Education feed</title>
  <link href="https://edu.example.com/"/>
  <entry>
    <title type="html">Early years &lt;em&gt;matter&lt;/em&gt;</title>
    <link rel="self" href="https://edu.example.com/api/1"/>
    <link rel="alternate" type="text/html" href="https://edu.example.com/posts/1"/>
    <updated>2025-01-05T12:00:00Z</updated>
    <media:thumbnail url="https://edu.example.com/1.png"/>
  </entry>
  <entry>
    <title>Second</title>
    <link href='/posts/2'/>
    <published>2025-01-04T12:00:00Z</published>
  </entry>
  <entry>
    <title>No link at all</title>
  </entry>
</feed>"#;
        let atom_source = FeedSource::new("Edu", "https://edu.example.com/feed.atom");

        let items = parse_feed(text, &atom_source);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Early years matter");
        assert_eq!(items[0].link, "https://edu.example.com/posts/1");
        assert_eq!(items[0].published_at.as_deref(), Some("2025-01-05T12:00:00Z"));
        assert_eq!(items[0].image.as_deref(), Some("https://edu.example.com/1.png"));
        assert_eq!(items[1].link, "https://edu.example.com/posts/2");
        assert_eq!(items[1].published_at.as_deref(), Some("2025-01-04T12:00:00Z"));
        assert_eq!(items[1].source, "Edu");
    }

    #[test]
    fn test_atom_only_used_when_rss_yields_nothing() {
        let text = rss(
            r#"<item><title>From RSS</title><link>https://news.example.mu/rss</link></item>
    <entry><title>From Atom</title><link href="https://news.example.mu/atom"/></entry>"#,
        );

        let items = parse_feed(&text, &source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "From RSS");
    }

    #[test]
    fn test_atom_link_falls_back_to_non_alternate() {
        let block = r#"<title>x</title><link rel="related" href="https://a/related"/>"#;
        assert_eq!(atom_link(block), Some("https://a/related"));
    }

    #[test]
    fn test_html_block_page_yields_nothing() {
        let text = r#"<!DOCTYPE html>
<html><head><title>Just a moment...</title></head>
<body><item><title>Fake</title><link>https://x/1</link></item></body></html>"#;

        assert!(parse_feed(text, &source()).is_empty());
        assert!(parse_feed("", &source()).is_empty());
    }

    #[test]
    fn test_malformed_feed_degrades_gracefully() {
        let text = r#"<rss><channel>
  <item><title>Unclosed description</title><link>https://news.example.mu/ok</link><description>oops</item>
  <item><title>Broken <b>markup</title><link>https://news.example.mu/ok2</link><pubDate></pubDate></item>
  <item><title>Truncated"#;

        let items = parse_feed(text, &source());
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].title, "Broken markup");
        assert_eq!(items[1].published_at, None);
    }
}
