use assist_chat::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ChatError> {
    assist_chat::config::init_env();

    let directory = ConversationDirectory::new(ApiConfig::from_env())?;
    for conversation in directory.list().await? {
        println!(
            "#{:<6} {}  ({})",
            conversation.id, conversation.title, conversation.updated_at
        );
    }
    Ok(())
}
