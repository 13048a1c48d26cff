use std::path::PathBuf;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{delete, get, middleware, post, put, web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use log::{error, info};

use serde::Deserialize;
use rs_markov_core::ingestor::Record;
use rs_markov_core::store::FileBackend;
use rs_markov_core::{ChannelKey, EngineConfig, MarkovEngine, MarkovError, UserId};

use rate_limit::RateLimiter;

mod rate_limit;

/// Upper bound on `max_len` imposed by this transport.
const MAX_LEN_LIMIT: usize = 3000;

type Engine = MarkovEngine<FileBackend>;

/// HTTP transport for the per-channel Markov generator
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
	/// Address to bind
	#[arg(long, default_value = "127.0.0.1")]
	bind: String,

	/// Port to listen on
	#[arg(long, default_value_t = 5000)]
	port: u16,

	/// Directory holding the persisted models and guild settings
	#[arg(long, default_value = "./data")]
	data_dir: PathBuf,

	/// The bot's own user id; its messages are never learned
	#[arg(long, default_value_t = 0)]
	bot_id: UserId,

	/// Command prefix used to seed an empty prefix list
	#[arg(long, default_value = "!")]
	default_prefix: String,

	/// Minimum delay between two generations of the same user (0 disables)
	#[arg(long, default_value_t = 10)]
	rate_limit_secs: u64,

	/// Accept cross-origin requests from anywhere
	#[arg(long)]
	permissive_cors: bool,
}

/// Body of the ingest endpoint
#[derive(Deserialize)]
struct MessageBody {
	author_id: UserId,
	text: String,
}

/// Query parameters of the generate endpoint
#[derive(Deserialize)]
struct GenerateParams {
	user_id: UserId,
	seed: Option<String>,
	max_len: Option<usize>,
}

#[derive(Deserialize)]
struct MaxLenBody {
	max_len: usize,
}

/// Maps a core error to an HTTP response.
fn error_response(e: MarkovError) -> HttpResponse {
	match e {
		MarkovError::NoData { .. } => HttpResponse::NotFound().body("No data for this channel yet, talk in the channel first"),
		MarkovError::InvalidArgument { .. } => HttpResponse::BadRequest().body(e.to_string()),
		MarkovError::StorageFailure(_) => {
			error!("{e}");
			HttpResponse::InternalServerError().body(e.to_string())
		}
	}
}

/// Runs an engine call on the blocking thread pool.
///
/// Engine calls take locks and touch the disk, which must not stall the async workers.
async fn run_blocking<T, F>(engine: web::Data<Engine>, f: F) -> Result<T, HttpResponse>
where
	F: FnOnce(&Engine) -> rs_markov_core::Result<T> + Send + 'static,
	T: Send + 'static,
{
	match web::block(move || f(&engine)).await {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(e)) => Err(error_response(e)),
		Err(e) => {
			error!("blocking task failed: {e}");
			Err(HttpResponse::InternalServerError().finish())
		}
	}
}

/// Rejects a `max_len` outside `1..=MAX_LEN_LIMIT`.
fn check_max_len(max_len: usize) -> Result<(), HttpResponse> {
	if (1..=MAX_LEN_LIMIT).contains(&max_len) {
		Ok(())
	} else {
		Err(HttpResponse::BadRequest().body(format!("max_len must be between 1 and {MAX_LEN_LIMIT}, got {max_len}")))
	}
}

/// HTTP POST endpoint `/v1/guilds/{guild}/channels/{channel}/messages`
///
/// Feeds one chat message to the channel model.
#[post("/v1/guilds/{guild}/channels/{channel}/messages")]
async fn post_message(engine: web::Data<Engine>, path: web::Path<(u64, u64)>, body: web::Json<MessageBody>) -> impl Responder {
	let (guild, channel) = path.into_inner();
	let MessageBody { author_id, text } = body.into_inner();

	let ingested = run_blocking(engine, move |engine| {
		engine.ingest(&Record { key: ChannelKey::new(guild, channel), author: author_id, text: &text })
	})
	.await;
	match ingested {
		Ok(_) => HttpResponse::NoContent().finish(),
		Err(response) => response,
	}
}

/// HTTP GET endpoint `/v1/guilds/{guild}/channels/{channel}/generate`
///
/// Generates text from the channel model. An empty `seed` counts as no seed.
/// `max_len` overrides the guild budget and must lie in `1..=MAX_LEN_LIMIT`.
#[get("/v1/guilds/{guild}/channels/{channel}/generate")]
async fn get_generated(
	engine: web::Data<Engine>,
	limiter: web::Data<RateLimiter>,
	path: web::Path<(u64, u64)>,
	query: web::Query<GenerateParams>,
) -> impl Responder {
	let (guild, channel) = path.into_inner();
	let GenerateParams { user_id, seed, max_len } = query.into_inner();

	if let Some(Err(response)) = max_len.map(check_max_len) {
		return response;
	}
	if let Err(wait) = limiter.check(user_id) {
		return HttpResponse::TooManyRequests().body(format!("Try again in {:.1}s", wait.as_secs_f32()));
	}

	let generated = run_blocking(engine, move |engine| {
		let seed = seed.as_deref().filter(|seed| !seed.is_empty());
		engine.generate(ChannelKey::new(guild, channel), seed, max_len)
	})
	.await;
	match generated {
		Ok(result) => HttpResponse::Ok().body(result),
		Err(response) => response,
	}
}

/// HTTP DELETE endpoint `/v1/guilds/{guild}/channels/{channel}/model`
#[delete("/v1/guilds/{guild}/channels/{channel}/model")]
async fn delete_model(engine: web::Data<Engine>, path: web::Path<(u64, u64)>) -> impl Responder {
	let (guild, channel) = path.into_inner();
	match run_blocking(engine, move |engine| engine.clear_channel(ChannelKey::new(guild, channel))).await {
		Ok(()) => HttpResponse::NoContent().finish(),
		Err(response) => response,
	}
}

#[get("/v1/guilds/{guild}/channels")]
async fn get_channels(engine: web::Data<Engine>, path: web::Path<u64>) -> impl Responder {
	let guild = path.into_inner();
	match run_blocking(engine, move |engine| engine.channels(guild)).await {
		Ok(channels) => HttpResponse::Ok().json(channels),
		Err(response) => response,
	}
}

#[get("/v1/guilds/{guild}/prefixes")]
async fn get_prefixes(engine: web::Data<Engine>, path: web::Path<u64>) -> impl Responder {
	let guild = path.into_inner();
	match run_blocking(engine, move |engine| engine.prefixes(guild)).await {
		Ok(prefixes) => HttpResponse::Ok().json(prefixes),
		Err(response) => response,
	}
}

#[put("/v1/guilds/{guild}/prefixes")]
async fn put_prefixes(engine: web::Data<Engine>, path: web::Path<u64>, body: web::Json<Vec<String>>) -> impl Responder {
	let guild = path.into_inner();
	let prefixes = body.into_inner();
	match run_blocking(engine, move |engine| engine.set_prefixes(guild, prefixes)).await {
		Ok(()) => HttpResponse::NoContent().finish(),
		Err(response) => response,
	}
}

#[get("/v1/guilds/{guild}/max_len")]
async fn get_max_len(engine: web::Data<Engine>, path: web::Path<u64>) -> impl Responder {
	let guild = path.into_inner();
	match run_blocking(engine, move |engine| engine.max_len(guild)).await {
		Ok(max_len) => HttpResponse::Ok().json(max_len),
		Err(response) => response,
	}
}

#[put("/v1/guilds/{guild}/max_len")]
async fn put_max_len(engine: web::Data<Engine>, path: web::Path<u64>, body: web::Json<MaxLenBody>) -> impl Responder {
	let guild = path.into_inner();
	let max_len = body.max_len;
	if let Err(response) = check_max_len(max_len) {
		return response;
	}
	match run_blocking(engine, move |engine| engine.set_max_len(guild, max_len)).await {
		Ok(()) => HttpResponse::NoContent().finish(),
		Err(response) => response,
	}
}

/// Main entry point for the server.
///
/// Opens the data directory, shares one engine between all workers,
/// and starts an Actix-web HTTP server.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let args = Args::parse();

	let backend = FileBackend::open(&args.data_dir)?;
	info!("serving models from {}", backend.root().display());

	let config = EngineConfig { bot_id: args.bot_id, default_prefix: args.default_prefix };
	let engine = web::Data::new(MarkovEngine::new(backend, config));
	let limiter = web::Data::new(RateLimiter::new(Duration::from_secs(args.rate_limit_secs)));
	let permissive_cors = args.permissive_cors;

	info!("listening on {}:{}", args.bind, args.port);
	HttpServer::new(move || {
		let cors = if permissive_cors { Cors::permissive() } else { Cors::default() };
		App::new()
			.wrap(middleware::Logger::default())
			.wrap(cors)
			.app_data(engine.clone())
			.app_data(limiter.clone())
			.service(post_message)
			.service(get_generated)
			.service(delete_model)
			.service(get_channels)
			.service(get_prefixes)
			.service(put_prefixes)
			.service(get_max_len)
			.service(put_max_len)
	})
		.bind((args.bind.as_str(), args.port))?
		.run()
		.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use actix_web::{http::StatusCode, test};

	fn engine(dir: &std::path::Path) -> web::Data<Engine> {
		let backend = FileBackend::open(dir).unwrap();
		web::Data::new(MarkovEngine::new(backend, EngineConfig { bot_id: 42, default_prefix: "m!".to_owned() }))
	}

	#[actix_web::test]
	async fn test_ingest_then_generate() {
		let dir = tempfile::tempdir().unwrap();
		let app = test::init_service(
			App::new()
				.app_data(engine(dir.path()))
				.app_data(web::Data::new(RateLimiter::new(Duration::from_secs(10))))
				.service(post_message)
				.service(get_generated),
		)
		.await;

		let req = test::TestRequest::get().uri("/v1/guilds/1/channels/2/generate?user_id=5").to_request();
		assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

		let req = test::TestRequest::post()
			.uri("/v1/guilds/1/channels/2/messages")
			.set_json(serde_json::json!({ "author_id": 7, "text": "a b." }))
			.to_request();
		assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

		let req = test::TestRequest::get().uri("/v1/guilds/1/channels/2/generate?user_id=6&seed=a").to_request();
		let body = test::call_and_read_body(&app, req).await;
		assert_eq!(body, web::Bytes::from_static(b"a b."));

		let req = test::TestRequest::get().uri("/v1/guilds/1/channels/2/generate?user_id=6&seed=a").to_request();
		assert_eq!(test::call_service(&app, req).await.status(), StatusCode::TOO_MANY_REQUESTS);
	}

	#[actix_web::test]
	async fn test_generate_rejects_out_of_range_max_len() {
		let dir = tempfile::tempdir().unwrap();
		let engine = engine(dir.path());
		engine.ingest(&Record { key: ChannelKey::new(1, 2), author: 7, text: "a b c" }).unwrap();
		let app = test::init_service(
			App::new()
				.app_data(engine)
				.app_data(web::Data::new(RateLimiter::new(Duration::from_secs(10))))
				.service(get_generated),
		)
		.await;

		for max_len in [0, MAX_LEN_LIMIT + 1, 200_000] {
			let uri = format!("/v1/guilds/1/channels/2/generate?user_id=5&max_len={max_len}");
			let req = test::TestRequest::get().uri(&uri).to_request();
			assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
		}

		// Rejected requests do not count against the rate limit
		let uri = format!("/v1/guilds/1/channels/2/generate?user_id=5&seed=a&max_len={MAX_LEN_LIMIT}");
		let req = test::TestRequest::get().uri(&uri).to_request();
		let body = test::call_and_read_body(&app, req).await;
		assert_eq!(body, web::Bytes::from_static(b"a b c"));
	}

	#[actix_web::test]
	async fn test_run_blocking_maps_errors() {
		let dir = tempfile::tempdir().unwrap();
		let key = ChannelKey::new(3, 4);

		let missing = run_blocking(engine(dir.path()), move |engine| engine.generate(key, None, None)).await;
		assert_eq!(missing.err().map(|response| response.status()), Some(StatusCode::NOT_FOUND));

		let invalid = run_blocking(engine(dir.path()), |engine| engine.set_max_len(3, 0)).await;
		assert_eq!(invalid.err().map(|response| response.status()), Some(StatusCode::BAD_REQUEST));

		let channels = run_blocking(engine(dir.path()), |engine| engine.channels(3)).await;
		assert_eq!(channels.ok(), Some(Vec::new()));
	}

	#[actix_web::test]
	async fn test_admin_routes() {
		let dir = tempfile::tempdir().unwrap();
		let app = test::init_service(
			App::new()
				.app_data(engine(dir.path()))
				.service(get_prefixes)
				.service(put_prefixes)
				.service(get_max_len)
				.service(put_max_len)
				.service(delete_model),
		)
		.await;

		let req = test::TestRequest::get().uri("/v1/guilds/1/prefixes").to_request();
		let prefixes: Vec<String> = test::call_and_read_body_json(&app, req).await;
		assert_eq!(prefixes, ["m!"]);

		let req = test::TestRequest::put().uri("/v1/guilds/1/prefixes").set_json(["?"]).to_request();
		assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

		for (max_len, status) in [(0, StatusCode::BAD_REQUEST), (3001, StatusCode::BAD_REQUEST), (50, StatusCode::NO_CONTENT)] {
			let req = test::TestRequest::put()
				.uri("/v1/guilds/1/max_len")
				.set_json(serde_json::json!({ "max_len": max_len }))
				.to_request();
			assert_eq!(test::call_service(&app, req).await.status(), status);
		}

		let req = test::TestRequest::get().uri("/v1/guilds/1/max_len").to_request();
		let max_len: usize = test::call_and_read_body_json(&app, req).await;
		assert_eq!(max_len, 50);

		let req = test::TestRequest::delete().uri("/v1/guilds/1/channels/9/model").to_request();
		assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
	}
}
