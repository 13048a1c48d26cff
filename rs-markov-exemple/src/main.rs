use std::fs;

use rs_markov_core::ingestor::Record;
use rs_markov_core::store::MemoryBackend;
use rs_markov_core::{ChannelKey, EngineConfig, MarkovEngine, MarkovError};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Everything lives in memory; the server uses the file backend instead
    let engine = MarkovEngine::new(MemoryBackend::new(), EngineConfig { bot_id: 1, default_prefix: "!".to_owned() });
    let channel = ChannelKey::new(1, 100);

    // Nothing learned yet: generation reports missing data
    match engine.generate(channel, None, None) {
        Err(MarkovError::NoData { .. }) => println!("No data yet, talk in the channel first"),
        other => println!("Should not happen: {other:?}"),
    }

    // Messages starting with one of these prefixes are bot commands and never learned
    engine.set_prefixes(channel.guild, vec!["!".to_owned(), "m!".to_owned()])?;

    // Feed a few chat messages, one of them a command
    for (author, text) in [
        (2, "the cat sat on the mat"),
        (3, "the dog sat on the cat."),
        (2, "m!generate please"),
        (4, "a cat is not a dog!"),
        (1, "the bot never learns from itself"),
    ] {
        let outcome = engine.ingest(&Record { key: channel, author, text })?;
        println!("{text:?} -> {outcome:?}");
    }

    // Import a chat log if one is available (one message per line)
    if let Ok(contents) = fs::read_to_string("./data/chat.txt") {
        let lines: Vec<String> = contents.lines().map(str::to_owned).collect();
        let pairs = engine.import_lines(channel, &lines)?;
        println!("Imported {} lines ({pairs} pairs)", lines.len());
    }

    // Generation budget is a number of words
    engine.set_max_len(channel.guild, 12)?;

    // Invalid budget is rejected
    match engine.set_max_len(channel.guild, 0) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{e}"),
    }

    // Unseeded generations start from a random word
    for i in 0..5 {
        println!("Generated {}: {}", i + 1, engine.generate(channel, None, None)?);
    }

    // Seeded generations continue the last word of the seed
    for seed in ["look at the", "unknown"] {
        println!("Seed {seed:?}: {}", engine.generate(channel, Some(seed), Some(6))?);
    }

    // Clearing the channel forgets everything it learned
    engine.clear_channel(channel)?;
    println!("After clear: {:?}", engine.generate(channel, None, None).err().map(|e| e.to_string()));

    Ok(())
}
