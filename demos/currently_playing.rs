use dotenvy::dotenv;
use spotifio::{client::SpotifyClientBuilder, prelude::*, Error};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let client_id = std::env::var("CLIENT_ID").expect("Spotify client ID not in environment");
    let spotify_client = SpotifyClientBuilder::new(client_id)
        .client_secret(std::env::var("CLIENT_SECRET").expect("Spotify client secret not in environment"))
        .scopes([Scope::UserReadCurrentlyPlaying, Scope::UserReadPlaybackState])
        // the token is saved here and reused on the next run
        .token_storage(JsonFileStorage::new("db"))
        .build()
        .expect("failed to build Spotify client");

    let stored_token = spotify_client
        .authenticator()
        .load_stored_token()
        .await
        .expect("failed to load stored token");

    if stored_token.is_none() {
        let request = spotify_client.begin_login().await.expect("failed to begin login");
        println!("Authorize URL: {}", request.url);

        let mut code = String::new();
        let mut state = String::new();

        println!("Code:");
        std::io::stdin().read_line(&mut code).unwrap();

        println!("State:");
        std::io::stdin().read_line(&mut state).unwrap();

        spotify_client
            .complete_login(code.trim(), state.trim())
            .await
            .expect("failed to complete login");
    }

    match spotify_client.currently_playing(None).await {
        Ok(Some(currently_playing)) => println!(
            "{} - {}",
            currently_playing["item"]["name"],
            currently_playing["item"]["artists"][0]["name"]
        ),
        Ok(None) => println!("Nothing is playing"),
        Err(Error::RateLimited(retry_after)) => println!("Rate limited, retry after {:?} seconds", retry_after),
        Err(err) => eprintln!("{}", err),
    }

    let devices = spotify_client.available_devices().await.unwrap();
    println!("{:#?}", devices);
}
