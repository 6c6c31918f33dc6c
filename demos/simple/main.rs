use annecy::{ClientConfig, Configuration, Offer};

#[tokio::main(flavor = "current_thread")]
pub async fn main() {
    env_logger::init();

    let token = std::env::var("ANNECY_TOKEN").unwrap();
    let engine = ClientConfig::new().to_engine().unwrap();
    engine.init(
        Configuration::new()
            .with_country("US")
            .with_idfa_gaid("00000000-0000-0000-0000-000000000000")
            .with_locale("en")
            .with_token(token)
            .with_user_id("1"),
    );

    // Start periodic visibility checks and view flushes.
    engine.start();

    let offers = engine
        .get_offers(|patched: &[Offer]| {
            println!("Lazy offers resolved: {} displayable", displayable(patched));
        })
        .await
        .unwrap();

    println!("Offers: {} displayable", displayable(&offers));

    // Pretend the first offer has been on screen.
    if let Some(offer) = offers.iter().find(|offer| offer.is_displayable()) {
        engine.track_offer_id(&offer.id);
    }

    // Give lazy calls a moment to finish, then report views before exiting.
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    println!("Flush: {:?}", engine.flush_views().await);

    engine.stop();
}

fn displayable(offers: &[Offer]) -> usize {
    offers.iter().filter(|offer| offer.is_displayable()).count()
}
