use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value};
use tracing::debug;

use crate::dao::{
    models::{
        Message, NewMessage, NewParticipant, NewProfile, NewProgram, Profile, Program, Room, Task,
        TimerRecord,
    },
    remote::{Backend, RemoteResult},
};

use super::{
    config::HttpBackendConfig,
    error::{HttpDaoError, HttpResult},
    models::{
        MessageCreateBody, ProfileCreateBody, ProgramCreateBody, ProgramTasksBody,
        RoomCreateBody, RoomJoinBody, rejection_message,
    },
};

/// Header carrying the caller identity on every request.
const IDENTITY_HEADER: &str = "X-Firebase-UID";

/// [`Backend`] implementation speaking JSON over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Arc<str>,
    identity_token: Option<Arc<str>>,
}

impl HttpBackend {
    /// Build the HTTP client. No request is issued until the first call.
    pub fn connect(config: HttpBackendConfig) -> HttpResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| HttpDaoError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            identity_token: config.identity_token.map(Arc::<str>::from),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        if let Some(ref token) = self.identity_token {
            builder.header(IDENTITY_HEADER, token.as_ref())
        } else {
            builder
        }
    }

    /// Send a request and return the decoded JSON payload, classifying failures.
    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> HttpResult<Value> {
        let mut builder = self.request(method, path);
        if let Some(ref body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| HttpDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpDaoError::RequestStatus {
                path: path.to_string(),
                status,
            });
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|source| HttpDaoError::DecodeResponse {
                path: path.to_string(),
                source,
            })?;

        if let Some(message) = rejection_message(&payload) {
            return Err(HttpDaoError::Rejected {
                path: path.to_string(),
                message,
            });
        }

        debug!(path, %status, "backend call succeeded");
        Ok(payload)
    }

    async fn get_optional<T>(&self, path: &str) -> HttpResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let payload = self.send_json(Method::GET, path, None).await?;
        if payload.is_null() {
            return Ok(None);
        }
        decode(path, payload).map(Some)
    }

    async fn get_required<T>(&self, path: &str) -> HttpResult<T>
    where
        T: DeserializeOwned,
    {
        self.get_optional(path)
            .await?
            .ok_or_else(|| HttpDaoError::MissingRecord {
                path: path.to_string(),
            })
    }

    async fn send_body<B, T>(&self, method: Method, path: &str, body: &B) -> HttpResult<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|source| HttpDaoError::DeserializeValue {
            path: path.to_string(),
            source,
        })?;
        let payload = self.send_json(method, path, Some(body)).await?;
        if payload.is_null() {
            return Err(HttpDaoError::MissingRecord {
                path: path.to_string(),
            });
        }
        decode(path, payload)
    }
}

fn decode<T>(path: &str, payload: Value) -> HttpResult<T>
where
    T: DeserializeOwned,
{
    from_value(payload).map_err(|source| HttpDaoError::DeserializeValue {
        path: path.to_string(),
        source,
    })
}

impl Backend for HttpBackend {
    fn fetch_room(&self, room_id: &str) -> BoxFuture<'static, RemoteResult<Room>> {
        let backend = self.clone();
        let path = format!("rooms/{room_id}");
        Box::pin(async move { backend.get_required(&path).await.map_err(Into::into) })
    }

    fn fetch_room_by_code(&self, code: &str) -> BoxFuture<'static, RemoteResult<Room>> {
        let backend = self.clone();
        let path = format!("rooms/code/{}", code.to_uppercase());
        Box::pin(async move { backend.get_required(&path).await.map_err(Into::into) })
    }

    fn create_room(
        &self,
        name: &str,
        owner: NewParticipant,
    ) -> BoxFuture<'static, RemoteResult<Room>> {
        let backend = self.clone();
        let name = name.to_owned();
        Box::pin(async move {
            let body = RoomCreateBody::new(&name, &owner);
            backend
                .send_body(Method::POST, "rooms", &body)
                .await
                .map_err(Into::into)
        })
    }

    fn join_room(
        &self,
        code: &str,
        participant: NewParticipant,
    ) -> BoxFuture<'static, RemoteResult<Room>> {
        let backend = self.clone();
        let code = code.to_uppercase();
        Box::pin(async move {
            let body = RoomJoinBody {
                room_code: &code,
                user_name: &participant.name,
                user_study_field: participant.study_field.as_deref(),
            };
            backend
                .send_body(Method::POST, "rooms/join", &body)
                .await
                .map_err(Into::into)
        })
    }

    fn fetch_messages(&self, room_id: &str) -> BoxFuture<'static, RemoteResult<Vec<Message>>> {
        let backend = self.clone();
        let path = format!("messages/{room_id}");
        Box::pin(async move {
            let messages = backend.get_optional::<Vec<Message>>(&path).await?;
            Ok(messages.unwrap_or_default())
        })
    }

    fn submit_message(&self, message: NewMessage) -> BoxFuture<'static, RemoteResult<Message>> {
        let backend = self.clone();
        Box::pin(async move {
            let body = MessageCreateBody::from(&message);
            backend
                .send_body(Method::POST, "messages", &body)
                .await
                .map_err(Into::into)
        })
    }

    fn replace_timer(
        &self,
        room_id: &str,
        record: TimerRecord,
    ) -> BoxFuture<'static, RemoteResult<()>> {
        let backend = self.clone();
        let path = format!("rooms/{room_id}/timer");
        Box::pin(async move {
            backend
                .send_body::<_, Value>(Method::PUT, &path, &record)
                .await?;
            Ok(())
        })
    }

    fn create_profile(&self, profile: NewProfile) -> BoxFuture<'static, RemoteResult<Profile>> {
        let backend = self.clone();
        Box::pin(async move {
            let body = ProfileCreateBody::from(&profile);
            backend
                .send_body(Method::POST, "profiles", &body)
                .await
                .map_err(Into::into)
        })
    }

    fn find_profile_by_external_id(
        &self,
        external_id: &str,
    ) -> BoxFuture<'static, RemoteResult<Option<Profile>>> {
        let backend = self.clone();
        let path = format!("profiles/by-firebase-uid/{external_id}");
        Box::pin(async move { backend.get_optional(&path).await.map_err(Into::into) })
    }

    fn create_program(&self, program: NewProgram) -> BoxFuture<'static, RemoteResult<Program>> {
        let backend = self.clone();
        Box::pin(async move {
            let body = ProgramCreateBody::from(&program);
            backend
                .send_body(Method::POST, "programs", &body)
                .await
                .map_err(Into::into)
        })
    }

    fn list_programs(&self, profile_id: &str) -> BoxFuture<'static, RemoteResult<Vec<Program>>> {
        let backend = self.clone();
        let path = format!("programs/{profile_id}");
        Box::pin(async move {
            let programs = backend.get_optional::<Vec<Program>>(&path).await?;
            Ok(programs.unwrap_or_default())
        })
    }

    fn replace_tasks(
        &self,
        program_id: &str,
        tasks: Vec<Task>,
    ) -> BoxFuture<'static, RemoteResult<Program>> {
        let backend = self.clone();
        let path = format!("programs/{program_id}");
        Box::pin(async move {
            let body = ProgramTasksBody { tasks: &tasks };
            backend
                .send_body(Method::PUT, &path, &body)
                .await
                .map_err(Into::into)
        })
    }
}
