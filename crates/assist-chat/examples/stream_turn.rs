use std::sync::Arc;

use assist_chat::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ChatError> {
    assist_chat::config::init_env();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ApiConfig::from_env();
    let directory = Arc::new(ConversationDirectory::new(config.clone())?);
    let client = StreamingChatClient::http(config)?.with_listener(directory.clone());

    let mut turn = client.send_turn("介绍一下毫米波阵列的波束赋形方法")?;
    while let Some(event) = turn.next_event().await {
        match event {
            TurnEvent::Delta { text, .. } => print!("{text}"),
            TurnEvent::ConversationAssigned { id, .. } => eprintln!("conversation #{id}"),
            TurnEvent::ErrorDisplayed { text, .. } => eprintln!("{text}"),
            TurnEvent::Completed { .. } => println!(),
            TurnEvent::Failed { failure, .. } => eprintln!("turn failed: {failure}"),
            TurnEvent::Started { .. } => {}
        }
    }

    let _ = turn.finish().await?;
    Ok(())
}
