use clap::{Parser, Subcommand};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::io::Write;

const TOKEN_FILE: &str = ".domuseye_token";

#[derive(Parser)]
#[command(name = "domuseye-cli")]
#[command(about = "CLI for the DomusEye API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        /// tenant, landlord or agent
        #[arg(short, long, default_value = "tenant")]
        role: String,
    },
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Logout,
    AddProperty {
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        price: String,
        #[arg(short, long)]
        location: String,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lng: Option<f64>,
        #[arg(short, long, default_value_t = 1)]
        beds: u32,
        /// Repeat for several amenities
        #[arg(short, long)]
        amenity: Vec<String>,
    },
    Search {
        #[arg(short, long)]
        q: Option<String>,
        #[arg(long)]
        min_beds: Option<u32>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Nearby {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        #[arg(short, long, default_value_t = 6)]
        limit: usize,
    },
    Apply {
        #[arg(short = 'P', long = "property")]
        property_id: String,
        #[arg(short, long, default_value = "")]
        message: String,
        #[arg(long)]
        move_in: Option<String>,
    },
    /// Your applications (tenant) or a property's queue (landlord/agent)
    Applications {
        #[arg(short = 'P', long = "property")]
        property_id: Option<String>,
    },
    SetApplicationStatus {
        #[arg(short = 'P', long = "property")]
        property_id: String,
        #[arg(short, long)]
        id: String,
        #[arg(short, long)]
        status: String,
    },
    Message {
        /// Recipient uid
        #[arg(short, long)]
        to: String,
        #[arg(short = 'T', long)]
        text: String,
    },
    /// Streams an AI completion to stdout
    Complete {
        #[arg(short, long)]
        prompt: String,
        #[arg(short = 'T', long, default_value = "")]
        text: String,
    },
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct ConversationRef {
    id: String,
}

fn authed(builder: RequestBuilder) -> RequestBuilder {
    let token = fs::read_to_string(TOKEN_FILE).unwrap_or_default();
    builder.bearer_auth(token.trim())
}

async fn print_response(res: Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => println!("{status}\n{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{status}\n{text}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let url = cli.url.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Register { name, email, password, role } => {
            let res = client
                .post(format!("{url}/register"))
                .json(&json!({ "name": name, "email": email, "password": password, "role": role }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Login { email, password } => {
            let res = client
                .post(format!("{url}/login"))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: LoginResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.token)?;
                println!("Logged in. Token saved to {TOKEN_FILE}");
            } else {
                println!("Login failed: {}", res.text().await?);
            }
        }
        Commands::Logout => {
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out");
        }
        Commands::AddProperty { title, price, location, lat, lng, beds, amenity } => {
            let res = authed(client.post(format!("{url}/properties")))
                .json(&json!({
                    "title": title,
                    "price": price,
                    "location": location,
                    "latitude": lat,
                    "longitude": lng,
                    "beds": beds,
                    "amenities": amenity,
                }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Search { q, min_beds, max_price, page } => {
            let mut query: Vec<(&str, String)> = vec![("page", page.to_string())];
            if let Some(q) = q {
                query.push(("q", q));
            }
            if let Some(min_beds) = min_beds {
                query.push(("minBeds", min_beds.to_string()));
            }
            if let Some(max_price) = max_price {
                query.push(("maxPrice", max_price.to_string()));
            }
            let res = client.get(format!("{url}/properties")).query(&query).send().await?;
            print_response(res).await?;
        }
        Commands::Nearby { lat, lng, limit } => {
            let res = client
                .get(format!("{url}/properties/nearby"))
                .query(&[("lat", lat.to_string()), ("lng", lng.to_string()), ("limit", limit.to_string())])
                .send()
                .await?;
            let status = res.status();
            if !status.is_success() {
                return print_response(res).await;
            }
            let listings: Vec<Value> = res.json().await?;
            for listing in listings {
                println!(
                    "{:<12} {:<40} {}",
                    listing["distanceLabel"].as_str().unwrap_or("?"),
                    listing["title"].as_str().unwrap_or(""),
                    listing["price"].as_str().unwrap_or("")
                );
            }
        }
        Commands::Apply { property_id, message, move_in } => {
            let res = authed(client.post(format!("{url}/properties/{property_id}/applications")))
                .json(&json!({ "message": message, "moveInDate": move_in }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Applications { property_id } => {
            let endpoint = match property_id {
                Some(id) => format!("{url}/properties/{id}/applications"),
                None => format!("{url}/applications/mine"),
            };
            let res = authed(client.get(endpoint)).send().await?;
            print_response(res).await?;
        }
        Commands::SetApplicationStatus { property_id, id, status } => {
            let res = authed(client.put(format!(
                "{url}/properties/{property_id}/applications/{id}/status"
            )))
            .json(&json!({ "status": status }))
            .send()
            .await?;
            print_response(res).await?;
        }
        Commands::Message { to, text } => {
            let res = authed(client.post(format!("{url}/conversations")))
                .json(&json!({ "participantId": to }))
                .send()
                .await?;
            if !res.status().is_success() {
                return print_response(res).await;
            }
            let conversation: ConversationRef = res.json().await?;
            let res = authed(client.post(format!("{url}/conversations/{}/messages", conversation.id)))
                .json(&json!({ "text": text }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Complete { prompt, text } => {
            let res = client
                .post(format!("{url}/api/completion"))
                .json(&json!({ "prompt": prompt, "text": text }))
                .send()
                .await?;
            if !res.status().is_success() {
                return print_response(res).await;
            }
            let mut stream = res.bytes_stream();
            let mut stdout = std::io::stdout();
            while let Some(chunk) = stream.next().await {
                stdout.write_all(&chunk?)?;
                stdout.flush()?;
            }
            println!();
        }
    }

    Ok(())
}
