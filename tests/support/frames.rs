//! Binance wire frames used by connector tests.

pub fn subscribe_ack() -> String {
    r#"{"result":null,"id":1}"#.to_string()
}

pub fn book_ticker(native: &str, bid: &str, ask: &str) -> String {
    format!(r#"{{"u":400900217,"s":"{native}","b":"{bid}","B":"1.5","a":"{ask}","A":"2.0"}}"#)
}

pub fn rest_book_tickers(rows: &[(&str, &str, &str)]) -> String {
    let rows: Vec<String> = rows
        .iter()
        .map(|(native, bid, ask)| {
            format!(
                r#"{{"symbol":"{native}","bidPrice":"{bid}","bidQty":"1","askPrice":"{ask}","askQty":"1"}}"#
            )
        })
        .collect();
    format!("[{}]", rows.join(","))
}

pub fn garbage() -> String {
    "{not json".to_string()
}
