use crate::{
    config::Config,
    error::AppError,
    middleware::auth::TokenAuthenticator,
    services::{
        encryption::MessageCipher,
        message_pipeline::MessagePipeline,
        store::{MessageStore, RoomDirectory, UserDirectory},
    },
    websocket::{broadcast::BroadcastDispatcher, ConnectionRegistry},
};
use crypto_core::jwt::JwtKeys;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: ConnectionRegistry,
    pub dispatcher: BroadcastDispatcher,
    pub pipeline: Arc<MessagePipeline>,
    pub authenticator: Arc<TokenAuthenticator>,
    pub rooms: Arc<dyn RoomDirectory>,
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    /// Wire every component around one store. The registry is created here
    /// and shared by the dispatcher and all sessions.
    pub fn new<S>(config: Arc<Config>, store: Arc<S>) -> Result<Self, AppError>
    where
        S: MessageStore + RoomDirectory + UserDirectory + 'static,
    {
        let keys = JwtKeys::from_secret_and_algorithm(config.jwt_secret.as_bytes(), &config.jwt_algorithm)
            .map_err(|e| AppError::Config(format!("jwt: {e}")))?;

        let registry = ConnectionRegistry::new();
        let dispatcher = BroadcastDispatcher::new(registry.clone());
        let messages: Arc<dyn MessageStore> = store.clone();
        let pipeline = MessagePipeline::new(messages, MessageCipher::new(config.encryption_key));

        Ok(Self {
            config,
            registry,
            dispatcher,
            pipeline: Arc::new(pipeline),
            authenticator: Arc::new(TokenAuthenticator::new(keys)),
            rooms: store.clone(),
            users: store,
        })
    }
}
