use clap::Parser;
use reqwest::Client;
use serde_json::{Value, json};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of a running server.
    #[arg(long, default_value = "http://127.0.0.1:1111")]
    url: String,

    /// Leader id to report positions under.
    #[arg(long, default_value = "MAIN")]
    leader_type: String,

    /// Tracking session to write into.
    #[arg(long, default_value = "current")]
    session: String,

    /// How many position updates to post before reading back.
    #[arg(long, default_value_t = 3)]
    updates: u32,

    /// Remove the leader again at the end.
    #[arg(long)]
    cleanup: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let client = Client::new();

    for step in 0..args.updates {
        let mut leaders = serde_json::Map::new();
        leaders.insert(
            args.leader_type.clone(),
            json!({
                "position": {
                    "lat": 40.4237 + f64::from(step) * 0.0005,
                    "lng": -86.9212,
                    "leaderType": args.leader_type,
                    "timestamp": 0
                },
                "stopIndex": step
            }),
        );
        let payload = json!({ "leaders": leaders, "currentStopIndex": step });

        let ack: Value = client
            .post(format!("{}/leader?session={}", args.url, args.session))
            .json(&payload)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        println!("Update {step}: {ack}");
    }

    let snapshot: Value = client
        .get(format!("{}/leader-data?session={}", args.url, args.session))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    println!("Snapshot: {snapshot:#}");

    if args.cleanup {
        let ack: Value = client
            .post(format!("{}/leader/remove?session={}", args.url, args.session))
            .json(&json!({ "leaderType": args.leader_type, "action": "remove" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        println!("Cleanup: {ack}");
    }
}
