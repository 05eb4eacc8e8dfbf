//! In-memory [`Backend`] used by tests, with failure injection and call counters.

use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::{
    models::{
        Message, NewMessage, NewParticipant, NewProfile, NewProgram, Participant, Profile,
        Program, Room, Task, TimerRecord,
    },
    remote::{Backend, RemoteError, RemoteResult},
};

/// Failure injected into the next calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Network,
    Server(u16),
}

impl Failure {
    fn into_error(self, path: &str) -> RemoteError {
        match self {
            Failure::Network => RemoteError::network(
                format!("request to `{path}` failed"),
                io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            ),
            Failure::Server(status) => RemoteError::Server {
                path: path.to_string(),
                status,
            },
        }
    }
}

#[derive(Default)]
struct FakeData {
    rooms: Vec<Room>,
    messages: Vec<Message>,
    profiles: Vec<Profile>,
    programs: Vec<Program>,
    failure: Option<Failure>,
    path_failures: Vec<(String, Failure)>,
    delay: Option<Duration>,
}

/// Shared in-memory backend. Clones observe the same data.
#[derive(Clone, Default)]
pub struct FakeBackend {
    data: Arc<Mutex<FakeData>>,
    calls: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_room(self, room: Room) -> Self {
        self.data.lock().unwrap().rooms.push(room);
        self
    }

    pub fn set_programs(&self, programs: Vec<Program>) {
        self.data.lock().unwrap().programs = programs;
    }

    pub fn add_profile(&self, profile: Profile) {
        self.data.lock().unwrap().profiles.push(profile);
    }

    pub fn push_message(&self, message: Message) {
        self.data.lock().unwrap().messages.push(message);
    }

    pub fn set_timer(&self, room_id: &str, record: TimerRecord) {
        let mut data = self.data.lock().unwrap();
        if let Some(room) = data.rooms.iter_mut().find(|room| room.id == room_id) {
            room.timer = record;
        }
    }

    pub fn timer(&self, room_id: &str) -> Option<TimerRecord> {
        let data = self.data.lock().unwrap();
        data.rooms
            .iter()
            .find(|room| room.id == room_id)
            .map(|room| room.timer.clone())
    }

    pub fn programs(&self) -> Vec<Program> {
        self.data.lock().unwrap().programs.clone()
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.data.lock().unwrap().profiles.clone()
    }

    /// Make every following call fail until [`FakeBackend::heal`] is called.
    pub fn fail_with(&self, failure: Failure) {
        self.data.lock().unwrap().failure = Some(failure);
    }

    /// Make calls to exactly `path` fail, leaving other endpoints healthy.
    pub fn fail_path(&self, path: &str, failure: Failure) {
        self.data
            .lock()
            .unwrap()
            .path_failures
            .push((path.to_owned(), failure));
    }

    pub fn heal(&self) {
        let mut data = self.data.lock().unwrap();
        data.failure = None;
        data.path_failures.clear();
    }

    /// Hold every following response back for `delay` before resolving it.
    pub fn delay_responses(&self, delay: Duration) {
        self.data.lock().unwrap().delay = Some(delay);
    }

    /// Number of calls issued so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn run<T, F>(&self, path: String, op: F) -> BoxFuture<'static, RemoteResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut FakeData) -> RemoteResult<T>,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data.lock().unwrap();
        let failure = data.failure.or_else(|| {
            data.path_failures
                .iter()
                .find(|(failing, _)| *failing == path)
                .map(|(_, failure)| *failure)
        });
        let result = match failure {
            Some(failure) => Err(failure.into_error(&path)),
            None => op(&mut data),
        };
        let delay = data.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

fn not_found(path: &str) -> RemoteError {
    RemoteError::NotFound {
        path: path.to_string(),
    }
}

fn room_id_for(name: &str) -> String {
    format!("room-{}", name.to_lowercase().replace(' ', "-"))
}

impl Backend for FakeBackend {
    fn fetch_room(&self, room_id: &str) -> BoxFuture<'static, RemoteResult<Room>> {
        let room_id = room_id.to_owned();
        let path = format!("rooms/{room_id}");
        self.run(path.clone(), move |data| {
            data.rooms
                .iter()
                .find(|room| room.id == room_id)
                .cloned()
                .ok_or_else(|| not_found(&path))
        })
    }

    fn fetch_room_by_code(&self, code: &str) -> BoxFuture<'static, RemoteResult<Room>> {
        let code = code.to_uppercase();
        let path = format!("rooms/code/{code}");
        self.run(path.clone(), move |data| {
            data.rooms
                .iter()
                .find(|room| room.code == code)
                .cloned()
                .ok_or_else(|| not_found(&path))
        })
    }

    fn create_room(
        &self,
        name: &str,
        owner: NewParticipant,
    ) -> BoxFuture<'static, RemoteResult<Room>> {
        let name = name.to_owned();
        self.run("rooms".into(), move |data| {
            let owner_id = Uuid::new_v4().to_string();
            let room = Room {
                id: room_id_for(&name),
                code: Uuid::new_v4().simple().to_string()[..6].to_uppercase(),
                name,
                owner_id: owner_id.clone(),
                participants: vec![Participant {
                    id: owner_id,
                    name: owner.name,
                    study_field: owner.study_field,
                }],
                timer: TimerRecord::default(),
            };
            data.rooms.push(room.clone());
            Ok(room)
        })
    }

    fn join_room(
        &self,
        code: &str,
        participant: NewParticipant,
    ) -> BoxFuture<'static, RemoteResult<Room>> {
        let code = code.to_uppercase();
        self.run("rooms/join".into(), move |data| {
            let room = data
                .rooms
                .iter_mut()
                .find(|room| room.code == code)
                .ok_or_else(|| not_found("rooms/join"))?;
            room.participants.push(Participant {
                id: Uuid::new_v4().to_string(),
                name: participant.name,
                study_field: participant.study_field,
            });
            Ok(room.clone())
        })
    }

    fn fetch_messages(&self, room_id: &str) -> BoxFuture<'static, RemoteResult<Vec<Message>>> {
        let room_id = room_id.to_owned();
        self.run(format!("messages/{room_id}"), move |data| {
            let mut messages = data
                .messages
                .iter()
                .filter(|message| message.room_id == room_id)
                .cloned()
                .collect::<Vec<_>>();
            messages.sort_by_key(|message| message.timestamp);
            Ok(messages)
        })
    }

    fn submit_message(&self, message: NewMessage) -> BoxFuture<'static, RemoteResult<Message>> {
        self.run("messages".into(), move |data| {
            let stored = Message {
                id: Uuid::new_v4().to_string(),
                room_id: message.room_id,
                sender_id: message.sender_id,
                sender_name: message.sender_name,
                sender_field: message.sender_field,
                content: message.content,
                timestamp: OffsetDateTime::now_utc(),
            };
            data.messages.push(stored.clone());
            Ok(stored)
        })
    }

    fn replace_timer(
        &self,
        room_id: &str,
        record: TimerRecord,
    ) -> BoxFuture<'static, RemoteResult<()>> {
        let room_id = room_id.to_owned();
        let path = format!("rooms/{room_id}/timer");
        self.run(path.clone(), move |data| {
            let room = data
                .rooms
                .iter_mut()
                .find(|room| room.id == room_id)
                .ok_or_else(|| not_found(&path))?;
            room.timer = record;
            Ok(())
        })
    }

    fn create_profile(&self, profile: NewProfile) -> BoxFuture<'static, RemoteResult<Profile>> {
        self.run("profiles".into(), move |data| {
            let stored = Profile {
                id: Uuid::new_v4().to_string(),
                external_id: profile.external_id,
                name: profile.name,
                study_field: profile.study_field,
            };
            data.profiles.push(stored.clone());
            Ok(stored)
        })
    }

    fn find_profile_by_external_id(
        &self,
        external_id: &str,
    ) -> BoxFuture<'static, RemoteResult<Option<Profile>>> {
        let external_id = external_id.to_owned();
        self.run(
            format!("profiles/by-firebase-uid/{external_id}"),
            move |data| {
                Ok(data
                    .profiles
                    .iter()
                    .find(|profile| profile.external_id.as_deref() == Some(external_id.as_str()))
                    .cloned())
            },
        )
    }

    fn create_program(&self, program: NewProgram) -> BoxFuture<'static, RemoteResult<Program>> {
        self.run("programs".into(), move |data| {
            let stored = Program {
                id: Uuid::new_v4().to_string(),
                profile_id: program.profile_id,
                exam_goal: program.exam_goal,
                daily_hours: program.daily_hours,
                study_days: program.study_days,
                tasks: Vec::new(),
            };
            data.programs.push(stored.clone());
            Ok(stored)
        })
    }

    fn list_programs(&self, profile_id: &str) -> BoxFuture<'static, RemoteResult<Vec<Program>>> {
        let profile_id = profile_id.to_owned();
        self.run(format!("programs/{profile_id}"), move |data| {
            Ok(data
                .programs
                .iter()
                .filter(|program| program.profile_id == profile_id)
                .cloned()
                .collect())
        })
    }

    fn replace_tasks(
        &self,
        program_id: &str,
        tasks: Vec<Task>,
    ) -> BoxFuture<'static, RemoteResult<Program>> {
        let program_id = program_id.to_owned();
        let path = format!("programs/{program_id}");
        self.run(path.clone(), move |data| {
            let program = data
                .programs
                .iter_mut()
                .find(|program| program.id == program_id)
                .ok_or_else(|| not_found(&path))?;
            program.tasks = tasks;
            Ok(program.clone())
        })
    }
}
