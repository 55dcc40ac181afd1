//! Listed and OTC common stocks from the TWSE ISIN registry.
//!
//! The registry pages (`C_public.jsp?strMode=2` for the main board,
//! `strMode=4` for OTC) are Big5-encoded HTML tables. Rows are grouped under
//! one-cell section headers naming the security class; newer layouts carry
//! the class in its own `有價證券別` column instead. Only common stock is kept,
//! and depositary receipts (codes starting `91`) are dropped.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use crate::error::AppError;

/// Anything that can enumerate the tickers to scan.
#[async_trait]
pub trait SymbolSource: Send + Sync {
    async fn symbols(&self) -> Result<Vec<String>, AppError>;
}

/// Security class label of common stock.
const COMMON_STOCK: &str = "股票";
const CODE_AND_NAME_HEADER: &str = "有價證券代號及名稱";
const CLASS_HEADER: &str = "有價證券別";
const DEPOSITARY_RECEIPT_PREFIX: &str = "91";

static ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("row pattern"));
static CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("cell pattern"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));

/// Board a registry page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    Listed,
    Otc,
}

impl Market {
    fn str_mode(self) -> &'static str {
        match self {
            Market::Listed => "2",
            Market::Otc => "4",
        }
    }

    /// Yahoo Finance ticker suffix.
    pub fn suffix(self) -> &'static str {
        match self {
            Market::Listed => ".TW",
            Market::Otc => ".TWO",
        }
    }
}

pub struct TwseListing {
    http: reqwest::Client,
    base_url: Url,
}

impl TwseListing {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::InvalidRequest(format!("TWSE_ISIN_URL: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, base_url })
    }

    async fn fetch(&self, market: Market) -> Result<Vec<String>, AppError> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("strMode", market.str_mode());

        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let symbols = parse_listing(&decode_page(&bytes), market);
        tracing::info!(?market, count = symbols.len(), "fetched stock listing");
        Ok(symbols)
    }
}

#[async_trait]
impl SymbolSource for TwseListing {
    async fn symbols(&self) -> Result<Vec<String>, AppError> {
        let mut symbols = self.fetch(Market::Listed).await?;
        symbols.extend(self.fetch(Market::Otc).await?);
        Ok(symbols)
    }
}

/// Decode a Big5 registry page.
pub fn decode_page(bytes: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::BIG5.decode(bytes);
    if had_errors {
        tracing::debug!("listing page contained undecodable bytes");
    }
    text.into_owned()
}

/// Extract Yahoo tickers of common stocks from a decoded registry page.
pub fn parse_listing(html: &str, market: Market) -> Vec<String> {
    let mut class_column: Option<usize> = None;
    let mut section = String::new();
    let mut symbols = Vec::new();

    for row in ROW.captures_iter(html) {
        let cells: Vec<String> = CELL
            .captures_iter(&row[1])
            .map(|cell| cell_text(&cell[1]))
            .collect();

        if cells.iter().any(|c| c == CODE_AND_NAME_HEADER) {
            class_column = cells.iter().position(|c| c == CLASS_HEADER);
            continue;
        }
        if cells.len() == 1 {
            section = cells[0].clone();
            continue;
        }

        let class = match class_column {
            Some(i) => cells.get(i).map(String::as_str).unwrap_or_default(),
            None => section.as_str(),
        };
        if class != COMMON_STOCK {
            continue;
        }

        let Some(code) = cells.first().and_then(|c| c.split_whitespace().next()) else {
            continue;
        };
        if code.is_empty()
            || !code.chars().all(|c| c.is_ascii_alphanumeric())
            || code.starts_with(DEPOSITARY_RECEIPT_PREFIX)
        {
            continue;
        }

        symbols.push(format!("{code}{}", market.suffix()));
    }

    symbols
}

fn cell_text(raw: &str) -> String {
    TAG.replace_all(raw, "")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTIONED: &str = r#"
<table class='h4' align=center cellSpacing=3 cellPadding=2 width=750 border=0>
<tr align=center><td bgcolor=#D5FFD5>有價證券代號及名稱 </td><td bgcolor=#D5FFD5>國際證券辨識號碼(ISIN Code)</td><td bgcolor=#D5FFD5>上市日</td><td bgcolor=#D5FFD5>市場別</td><td bgcolor=#D5FFD5>產業別</td><td bgcolor=#D5FFD5>CFICode</td><td bgcolor=#D5FFD5>備註</td></tr>
<tr><td bgcolor=#FAFAD2 colspan=7 ><B> 股票 <B> </td></tr>
<tr><td bgcolor=#FAFAD2>1101　台泥</td><td bgcolor=#FAFAD2>TW0001101004</td><td bgcolor=#FAFAD2>1962/02/09</td><td bgcolor=#FAFAD2>上市</td><td bgcolor=#FAFAD2>水泥工業</td><td bgcolor=#FAFAD2>ESVUFR</td><td bgcolor=#FAFAD2></td></tr>
<tr><td bgcolor=#FAFAD2>2330　台積電</td><td bgcolor=#FAFAD2>TW0002330008</td><td bgcolor=#FAFAD2>1994/09/05</td><td bgcolor=#FAFAD2>上市</td><td bgcolor=#FAFAD2>半導體業</td><td bgcolor=#FAFAD2>ESVUFR</td><td bgcolor=#FAFAD2></td></tr>
<tr><td bgcolor=#FAFAD2>9136　巨騰-DR</td><td bgcolor=#FAFAD2>TW0009136002</td><td bgcolor=#FAFAD2>2009/12/11</td><td bgcolor=#FAFAD2>上市</td><td bgcolor=#FAFAD2></td><td bgcolor=#FAFAD2>EDSDDR</td><td bgcolor=#FAFAD2></td></tr>
<tr><td bgcolor=#FAFAD2 colspan=7 ><B> 上市認購(售)權證 <B> </td></tr>
<tr><td bgcolor=#FAFAD2>030001　台積電元大34購01</td><td bgcolor=#FAFAD2>TW18Z0300013</td><td bgcolor=#FAFAD2>2024/01/02</td><td bgcolor=#FAFAD2>上市</td><td bgcolor=#FAFAD2></td><td bgcolor=#FAFAD2>RWSCCE</td><td bgcolor=#FAFAD2></td></tr>
</table>"#;

    #[test]
    fn keeps_common_stock_section_only() {
        assert_eq!(
            parse_listing(SECTIONED, Market::Listed),
            vec!["1101.TW".to_string(), "2330.TW".to_string()]
        );
    }

    #[test]
    fn honours_explicit_class_column() {
        let html = r#"
<table>
<tr><td>有價證券代號及名稱</td><td>國際證券辨識號碼(ISIN Code)</td><td>上市日</td><td>有價證券別</td></tr>
<tr><td>6770 力積電</td><td>TW0006770007</td><td>2021/12/06</td><td>股票</td></tr>
<tr><td>00679B 元大美債20年</td><td>TW00000679B0</td><td>2017/01/17</td><td>ETF</td></tr>
<tr><td>3105 穩懋</td><td>TW0003105003</td><td>2010/10/27</td><td>股票</td></tr>
</table>"#;

        assert_eq!(
            parse_listing(html, Market::Otc),
            vec!["6770.TWO".to_string(), "3105.TWO".to_string()]
        );
    }

    #[test]
    fn decodes_big5_pages() {
        let (bytes, _, _) = encoding_rs::BIG5.encode(SECTIONED);

        let decoded = decode_page(&bytes);

        assert_eq!(parse_listing(&decoded, Market::Listed).len(), 2);
    }
}
