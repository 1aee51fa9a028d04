use anyhow::Result;
use event_scraper::browser::{MemoryBrowser, StaticPage};
use event_scraper::config::ScrapeSettings;
use event_scraper::pagination::search_url;
use event_scraper::pipeline::Pipeline;
use event_scraper::statistics::{analyse_batch, Statistics};
use event_scraper::storage::ResultStore;
use event_scraper::types::Period;
use std::fs;
use tempfile::tempdir;

fn card(slug: &str, category: &str, paid_status: &str, price: Option<&str>) -> String {
    let price = price
        .map(|p| format!(r#"<div class="Stack priceWrapper">{p}</div>"#))
        .unwrap_or_default();
    format!(
        r#"<li><section class="event-card-details">
            <a href="/e/{slug}" data-event-category="{category}" data-event-paid-status="{paid_status}">{slug}</a>
            {price}
        </section></li>"#
    )
}

fn results_page(cards: &[String], has_next: bool) -> StaticPage {
    let next = if has_next {
        r#"<li data-testid="page-next-wrapper"><button aria-label="Next page"></button></li>"#
    } else {
        ""
    };
    StaticPage::ok(format!(
        r#"<html><body><div class="search-results-panel-content"><div>
            <section><ul class="SearchResultPanelContentEventCardList-module__list">{}</ul></section>
            <footer><ul>{next}</ul></footer>
        </div></div></body></html>"#,
        cards.join("\n")
    ))
}

fn event_page(organizer: &str, datetime: &str, location: &str) -> StaticPage {
    StaticPage::ok(format!(
        r#"<html><body>
            <div data-testid="organizerBrief"><strong class="organizer-listing-info-name">{organizer}</strong></div>
            <time class="start-date" datetime="{datetime}">soon</time>
            <div class="location-info">{location}<button class="map-button-toggle">Show map</button></div>
        </body></html>"#
    ))
}

fn event_url(slug: &str) -> String {
    format!("https://www.eventbrite.sg/e/{slug}")
}

fn site(period: Period) -> MemoryBrowser {
    MemoryBrowser::new()
        .with_page(
            search_url(period, 1),
            results_page(
                &[
                    card("rooftop-jazz", "music", "paid", Some("$10.00")),
                    card("food-fest", "food-and-drink", "free", None),
                ],
                true,
            ),
        )
        .with_page(
            search_url(period, 2),
            results_page(
                &[
                    card("gala-dinner", "charity", "paid", Some("S$1,250.00")),
                    card("old-show", "music", "paid", Some("$20")),
                    card("cancelled", "music", "paid", Some("$5")),
                ],
                false,
            ),
        )
        .with_page(
            event_url("rooftop-jazz"),
            event_page("Blue Note", "2099-03-01T20:00:00+08:00", "Marina Bay Sands, Singapore 018956"),
        )
        .with_page(
            event_url("food-fest"),
            event_page("Makan Club", "2099-03-15T11:00:00+08:00", "Online"),
        )
        .with_page(
            event_url("gala-dinner"),
            event_page("Blue Note", "2099-04-02T19:00:00+08:00", "Raffles Hotel, singapore"),
        )
        .with_page(
            event_url("old-show"),
            event_page("Old Org", "2001-01-01T20:00:00+08:00", "Singapore"),
        )
        .with_page(event_url("cancelled"), StaticPage::with_status(404, "<h1>Gone</h1>"))
}

#[tokio::test]
async fn test_full_run_saves_batch_and_report() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = ResultStore::new(temp_dir.path().join("results"));
    let period = Period::NextMonth;
    let mut browser = site(period);

    let result =
        Pipeline::run_with_browser(&mut browser, &store, period, &ScrapeSettings::default()).await?;

    assert_eq!(result.listings_found, 5);
    assert_eq!(result.listings_saved, 3);
    assert!(browser.is_closed());
    assert_eq!(browser.open_pages(), 0);

    let batch = store.load(&result.batch_id)?;
    let mut urls: Vec<_> = batch.listings.iter().map(|l| l.url.clone()).collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![event_url("food-fest"), event_url("gala-dinner"), event_url("rooftop-jazz")]
    );

    let gala = batch
        .listings
        .iter()
        .find(|l| l.title == "gala-dinner")
        .expect("gala dinner should be enriched");
    assert_eq!(gala.price, Some(1250.0));
    assert_eq!(gala.location.as_deref(), Some("Singapore"));
    assert_eq!(gala.date.as_deref(), Some("02-04-2099"));

    let food = batch.listings.iter().find(|l| l.title == "food-fest").unwrap();
    assert_eq!(food.price, None);
    assert_eq!(food.location.as_deref(), Some("Online"));

    let csv = fs::read_to_string(store.csv_path(&result.batch_id))?;
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.starts_with("title,url,category,type,price,organizer,location,date"));

    let report_path = result.report_path.expect("report should be written");
    let report = fs::read_to_string(report_path)?;
    assert!(report.contains("- Total Upcoming Events: 3"));
    assert!(report.contains("- Paid event: 2 (66.67%)"));
    assert!(report.contains("- Free event: 1 (33.33%)"));
    assert!(report.contains("- Time Range: 2099-03 to 2099-04"));
    assert!(report.contains("- gala-dinner (1250 SGD)"));
    assert!(report.contains("- Blue Note (2 times/66.67%)"));

    Ok(())
}

#[tokio::test]
async fn test_report_regeneration_is_byte_identical() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = ResultStore::new(temp_dir.path());
    let period = Period::ThisWeekend;
    let mut browser = site(period);

    let result =
        Pipeline::run_with_browser(&mut browser, &store, period, &ScrapeSettings::default()).await?;

    let first = fs::read(analyse_batch(&store, &result.batch_id)?)?;
    let second = fs::read(analyse_batch(&store, &result.batch_id)?)?;
    assert_eq!(first, second);

    let batch = store.load(&result.batch_id)?;
    let rendered = Statistics::from_batch(&batch).render_report();
    assert_eq!(rendered.as_bytes(), first.as_slice());

    Ok(())
}

#[tokio::test]
async fn test_corrupt_batch_skips_report() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = ResultStore::new(temp_dir.path());
    fs::create_dir_all(store.batch_dir("1700000000000"))?;
    fs::write(store.json_path("1700000000000"), "[{\"title\": 1}]")?;

    assert!(analyse_batch(&store, "1700000000000").is_err());
    assert!(!store.report_path("1700000000000").exists());
    Ok(())
}
