//! UseCase 層
//!
//! クライアントからの操作 1 つにつき 1 つのユースケースを置きます。
//! ルームの状態を読んでから書き換える操作は、ルームのロックを保持したまま
//! 「永続化 → メモリ更新 → 通知」の順で実行します。

mod connect_participant;
mod create_channel;
mod disconnect_participant;
pub mod error;
mod get_room_detail;
mod get_rooms;
mod join_channel;
mod join_room;
mod leave_channel;
mod leave_room;
mod post_reply;
mod react;
mod relay_signal;
mod send_message;
mod support;
mod update_presence;
mod view_thread;

#[cfg(test)]
pub(crate) mod test_support;

pub use connect_participant::ConnectParticipantUseCase;
pub use create_channel::CreateChannelUseCase;
pub use disconnect_participant::DisconnectParticipantUseCase;
pub use error::{ConnectError, GetRoomDetailError, RoomActionError};
pub use get_room_detail::GetRoomDetailUseCase;
pub use get_rooms::GetRoomsUseCase;
pub use join_channel::JoinChannelUseCase;
pub use join_room::JoinRoomUseCase;
pub use leave_channel::LeaveChannelUseCase;
pub use leave_room::LeaveRoomUseCase;
pub use post_reply::PostReplyUseCase;
pub use react::ReactUseCase;
pub use relay_signal::RelaySignalUseCase;
pub use send_message::SendMessageUseCase;
pub use update_presence::UpdatePresenceUseCase;
pub use view_thread::ViewThreadUseCase;
