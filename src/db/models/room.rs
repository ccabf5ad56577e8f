use serde::Serialize;

/// A room of the guesthouse. The set is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Room {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub image: &'static str,
}

pub static ROOMS: [Room; 3] = [
    Room {
        id: "1",
        name: "Студия",
        description: "Уютный номер с мини-кухней",
        image: "https://picsum.photos/400/300?random=1",
    },
    Room {
        id: "2",
        name: "Двухкомнатный Море",
        description: "Вид на море, просторная гостиная",
        image: "https://picsum.photos/400/300?random=2",
    },
    Room {
        id: "3",
        name: "Двухкомнатная Студия",
        description: "Тихий номер с видом в сад",
        image: "https://picsum.photos/400/300?random=3",
    },
];

impl Room {
    pub fn find(id: &str) -> Option<&'static Room> {
        ROOMS.iter().find(|room| room.id == id)
    }
}
