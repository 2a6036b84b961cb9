//! Sled-backed document store.
//!
//! Each collection is its own tree holding serde JSON documents. Nested
//! collections (`properties/{id}/applications` and friends) are flattened
//! into `{parentId}/{childId}` keys so a prefix scan lists the children of
//! one parent.
//!
//! Applications live only in the `applications` tree. The per-tenant view
//! (`tenant_applications`) is a key-only index written in the same
//! transaction as the record, so status changes are a single write.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, Transactional};
use sled::{Db, Subscriber, Tree};
use std::path::Path;

use crate::error::{StorageError, StorageResult};
use crate::models::{
    snippet, Application, ApplicationStatus, CommunityPost, Conversation, Message, Payment,
    Property, PropertyTenant, User,
};

#[derive(Clone)] // Sled handles are cheap to clone and thread-safe
pub struct Storage {
    db: Db,
    users: Tree,
    user_emails: Tree, // lowercased email -> uid
    properties: Tree,
    applications: Tree,        // {propertyId}/{applicationId} -> Application
    tenant_applications: Tree, // {tenantId}/{propertyId}/{applicationId} -> ()
    open_applications: Tree,   // {tenantId}/{propertyId} -> applicationId
    tenants: Tree,             // {propertyId}/{tenantId} -> PropertyTenant
    community_board: Tree,     // {propertyId}/{postId} -> CommunityPost
    payments: Tree,            // {propertyId}/{paymentId} -> Payment
    conversations: Tree,
    messages: Tree, // {conversationId}/{seq:016x} -> Message
}

fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn child_key(parent: &str, child: &str) -> String {
    format!("{parent}/{child}")
}

fn scan<T: DeserializeOwned>(tree: &Tree, prefix: &str) -> StorageResult<Vec<T>> {
    tree.scan_prefix(prefix.as_bytes())
        .map(|item| {
            let (_, value) = item?;
            decode(&value)
        })
        .collect()
}

fn scan_children<T: DeserializeOwned>(tree: &Tree, parent: &str) -> StorageResult<Vec<T>> {
    scan(tree, &format!("{parent}/"))
}

// Transaction helpers: everything inside a sled transaction must surface
// as ConflictableTransactionError.
fn abort<T>(err: StorageError) -> ConflictableTransactionResult<T, StorageError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn tx_encode<T: Serialize>(value: &T) -> ConflictableTransactionResult<Vec<u8>, StorageError> {
    encode(value).map_err(ConflictableTransactionError::Abort)
}

fn tx_decode<T: DeserializeOwned>(bytes: &[u8]) -> ConflictableTransactionResult<T, StorageError> {
    decode(bytes).map_err(ConflictableTransactionError::Abort)
}

/// Key of the conversation shared by exactly this participant set.
pub fn conversation_id(participants: &[String]) -> String {
    participants.join("_")
}

/// Sorts and deduplicates a participant list.
pub fn normalize_participants(mut participants: Vec<String>) -> Vec<String> {
    participants.retain(|p| !p.trim().is_empty());
    participants.sort();
    participants.dedup();
    participants
}

impl Storage {
    /// Open or create the Sled database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store removed on drop; used by tests and demos.
    pub fn temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        Ok(Self {
            users: db.open_tree("users")?,
            user_emails: db.open_tree("user_emails")?,
            properties: db.open_tree("properties")?,
            applications: db.open_tree("applications")?,
            tenant_applications: db.open_tree("tenant_applications")?,
            open_applications: db.open_tree("open_applications")?,
            tenants: db.open_tree("tenants")?,
            community_board: db.open_tree("community_board")?,
            payments: db.open_tree("payments")?,
            conversations: db.open_tree("conversations")?,
            messages: db.open_tree("messages")?,
            db,
        })
    }

    pub async fn flush(&self) -> StorageResult<usize> {
        Ok(self.db.flush_async().await?)
    }

    // --- users ---

    /// Registers a user; emails are unique case-insensitively.
    pub fn create_user(&self, user: &User) -> StorageResult<()> {
        let email_key = user.email.trim().to_lowercase();
        let bytes = encode(user)?;

        (&self.users, &self.user_emails).transaction(|(users, emails)| {
            if emails.get(email_key.as_bytes())?.is_some() {
                return abort(StorageError::AlreadyExists {
                    collection: "user",
                    id: email_key.clone(),
                });
            }
            if users.get(user.uid.as_bytes())?.is_some() {
                return abort(StorageError::AlreadyExists {
                    collection: "user",
                    id: user.uid.clone(),
                });
            }
            users.insert(user.uid.as_bytes(), bytes.clone())?;
            emails.insert(email_key.as_bytes(), user.uid.as_bytes())?;
            Ok(())
        })?;
        Ok(())
    }

    pub fn get_user(&self, uid: &str) -> StorageResult<Option<User>> {
        self.users
            .get(uid.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn require_user(&self, uid: &str) -> StorageResult<User> {
        self.get_user(uid)?
            .ok_or_else(|| StorageError::not_found("user", uid))
    }

    pub fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let key = email.trim().to_lowercase();
        match self.user_emails.get(key.as_bytes())? {
            Some(uid) => self.get_user(&String::from_utf8_lossy(&uid)),
            None => Ok(None),
        }
    }

    /// Replaces a user's profile. The email (and its index entry) is fixed at registration.
    pub fn update_user(&self, user: &User) -> StorageResult<()> {
        let existing = self.require_user(&user.uid)?;
        if !existing.email.eq_ignore_ascii_case(&user.email) {
            return Err(StorageError::Conflict("email cannot be changed".into()));
        }
        self.users.insert(user.uid.as_bytes(), encode(user)?)?;
        Ok(())
    }

    pub fn all_users(&self) -> StorageResult<Vec<User>> {
        scan(&self.users, "")
    }

    // --- properties ---

    pub fn insert_property(&self, property: &Property) -> StorageResult<()> {
        self.properties
            .compare_and_swap(
                property.id.as_bytes(),
                None as Option<&[u8]>,
                Some(encode(property)?),
            )?
            .map_err(|_| StorageError::AlreadyExists {
                collection: "property",
                id: property.id.clone(),
            })
    }

    pub fn get_property(&self, id: &str) -> StorageResult<Option<Property>> {
        self.properties
            .get(id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn require_property(&self, id: &str) -> StorageResult<Property> {
        self.get_property(id)?
            .ok_or_else(|| StorageError::not_found("property", id))
    }

    /// Overwrites an existing property (last write wins).
    /// Applies `patch` to the stored record inside a transaction and returns
    /// the result. Counters bumped by other writers are never overwritten.
    pub fn modify_property<F>(&self, id: &str, patch: F) -> StorageResult<Property>
    where
        F: Fn(&mut Property),
    {
        let updated = self.properties.transaction(|tree| {
            let Some(bytes) = tree.get(id.as_bytes())? else {
                return abort(StorageError::not_found("property", id));
            };
            let mut property: Property = tx_decode(&bytes)?;
            patch(&mut property);
            tree.insert(id.as_bytes(), tx_encode(&property)?)?;
            Ok(property)
        })?;
        Ok(updated)
    }

    /// Increments the view counter and returns the updated record.
    pub fn record_property_view(&self, id: &str) -> StorageResult<Property> {
        self.modify_property(id, |property| property.views += 1)
    }

    pub fn all_properties(&self) -> StorageResult<Vec<Property>> {
        scan(&self.properties, "")
    }

    pub fn properties_by_landlord(&self, landlord_id: &str) -> StorageResult<Vec<Property>> {
        Ok(self
            .all_properties()?
            .into_iter()
            .filter(|p| p.landlord_id == landlord_id)
            .collect())
    }

    // --- applications ---

    /// Stores a new application, bumps the property's inquiry counter and
    /// indexes it under the tenant, atomically. A tenant may hold only one
    /// open application per property.
    pub fn create_application(&self, application: &Application) -> StorageResult<()> {
        let app_key = child_key(&application.property_id, &application.id);
        let index_key = child_key(&application.tenant_id, &app_key);
        let open_key = child_key(&application.tenant_id, &application.property_id);
        let bytes = encode(application)?;

        (
            &self.properties,
            &self.applications,
            &self.tenant_applications,
            &self.open_applications,
        )
            .transaction(|(properties, applications, index, open)| {
                let Some(prop_bytes) = properties.get(application.property_id.as_bytes())? else {
                    return abort(StorageError::not_found(
                        "property",
                        &application.property_id,
                    ));
                };
                if let Some(existing) = open.get(open_key.as_bytes())? {
                    return abort(StorageError::Conflict(format!(
                        "tenant already has open application {}",
                        String::from_utf8_lossy(&existing)
                    )));
                }

                let mut property: Property = tx_decode(&prop_bytes)?;
                property.inquiries += 1;
                properties.insert(application.property_id.as_bytes(), tx_encode(&property)?)?;

                applications.insert(app_key.as_bytes(), bytes.clone())?;
                index.insert(index_key.as_bytes(), &[] as &[u8])?;
                open.insert(open_key.as_bytes(), application.id.as_bytes())?;
                Ok(())
            })?;
        Ok(())
    }

    pub fn get_application(
        &self,
        property_id: &str,
        application_id: &str,
    ) -> StorageResult<Option<Application>> {
        self.applications
            .get(child_key(property_id, application_id).as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn applications_for_property(&self, property_id: &str) -> StorageResult<Vec<Application>> {
        scan_children(&self.applications, property_id)
    }

    /// Resolves the tenant index into application records.
    pub fn applications_for_tenant(&self, tenant_id: &str) -> StorageResult<Vec<Application>> {
        let prefix = format!("{tenant_id}/");
        let mut out = Vec::new();
        for item in self.tenant_applications.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            let app_key = &key[prefix.len()..];
            if let Some(bytes) = self.applications.get(app_key)? {
                out.push(decode(&bytes)?);
            }
        }
        Ok(out)
    }

    pub fn all_applications(&self) -> StorageResult<Vec<Application>> {
        scan(&self.applications, "")
    }

    /// Moves an application to `next`, validating the lifecycle. Confirming
    /// also records the tenancy in the same transaction.
    pub fn transition_application(
        &self,
        property_id: &str,
        application_id: &str,
        next: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> StorageResult<Application> {
        let app_key = child_key(property_id, application_id);

        let updated = (&self.applications, &self.open_applications, &self.tenants).transaction(
            |(applications, open, tenants)| {
                let Some(bytes) = applications.get(app_key.as_bytes())? else {
                    return abort(StorageError::not_found("application", application_id));
                };
                let mut application: Application = tx_decode(&bytes)?;
                if !application.status.can_transition_to(next) {
                    return abort(StorageError::InvalidTransition {
                        from: application.status,
                        to: next,
                    });
                }

                application.status = next;
                application.updated_at = now;
                applications.insert(app_key.as_bytes(), tx_encode(&application)?)?;

                if next.is_terminal() {
                    open.remove(child_key(&application.tenant_id, property_id).as_bytes())?;
                }
                if next == ApplicationStatus::Confirmed {
                    let tenancy = PropertyTenant {
                        property_id: property_id.to_string(),
                        tenant_id: application.tenant_id.clone(),
                        tenant_name: application.tenant_name.clone(),
                        application_id: application.id.clone(),
                        since: now,
                    };
                    tenants.insert(
                        child_key(property_id, &application.tenant_id).as_bytes(),
                        tx_encode(&tenancy)?,
                    )?;
                }
                Ok(application)
            },
        )?;
        Ok(updated)
    }

    pub fn tenants_for_property(&self, property_id: &str) -> StorageResult<Vec<PropertyTenant>> {
        scan_children(&self.tenants, property_id)
    }

    pub fn is_tenant_of(&self, property_id: &str, tenant_id: &str) -> StorageResult<bool> {
        Ok(self
            .tenants
            .contains_key(child_key(property_id, tenant_id).as_bytes())?)
    }

    // --- community board ---

    pub fn add_community_post(&self, post: &CommunityPost) -> StorageResult<()> {
        if !self.properties.contains_key(post.property_id.as_bytes())? {
            return Err(StorageError::not_found("property", &post.property_id));
        }
        self.community_board.insert(
            child_key(&post.property_id, &post.id).as_bytes(),
            encode(post)?,
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn community_posts(&self, property_id: &str) -> StorageResult<Vec<CommunityPost>> {
        let mut posts: Vec<CommunityPost> = scan_children(&self.community_board, property_id)?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    // --- payments ---

    pub fn record_payment(&self, payment: &Payment) -> StorageResult<()> {
        self.payments.insert(
            child_key(&payment.property_id, &payment.id).as_bytes(),
            encode(payment)?,
        )?;
        Ok(())
    }

    pub fn payments_for_property(&self, property_id: &str) -> StorageResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = scan_children(&self.payments, property_id)?;
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(payments)
    }

    pub fn payments_for_tenant(&self, tenant_id: &str) -> StorageResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = scan::<Payment>(&self.payments, "")?
            .into_iter()
            .filter(|p| p.tenant_id == tenant_id)
            .collect();
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(payments)
    }

    // --- conversations & messages ---

    /// Returns the conversation for this participant set, creating it on first use.
    pub fn open_conversation(
        &self,
        participants: Vec<String>,
        property_id: Option<String>,
        now: DateTime<Utc>,
    ) -> StorageResult<Conversation> {
        let participants = normalize_participants(participants);
        if participants.len() < 2 {
            return Err(StorageError::Conflict(
                "a conversation needs at least two participants".into(),
            ));
        }
        let id = conversation_id(&participants);
        let conversation = Conversation {
            id: id.clone(),
            unread: participants.iter().map(|p| (p.clone(), 0)).collect(),
            participants,
            property_id,
            last_message: None,
            last_message_at: None,
            created_at: now,
        };

        match self.conversations.compare_and_swap(
            id.as_bytes(),
            None as Option<&[u8]>,
            Some(encode(&conversation)?),
        )? {
            Ok(()) => Ok(conversation),
            Err(existing) => match existing.current {
                Some(bytes) => decode(&bytes),
                None => Err(StorageError::Conflict(format!(
                    "conversation {id} changed concurrently"
                ))),
            },
        }
    }

    pub fn get_conversation(&self, id: &str) -> StorageResult<Option<Conversation>> {
        self.conversations
            .get(id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Most recently active first.
    pub fn conversations_for_user(&self, uid: &str) -> StorageResult<Vec<Conversation>> {
        let mut conversations: Vec<Conversation> = scan::<Conversation>(&self.conversations, "")?
            .into_iter()
            .filter(|c| c.has_participant(uid))
            .collect();
        conversations.sort_by(|a, b| {
            b.last_message_at
                .unwrap_or(b.created_at)
                .cmp(&a.last_message_at.unwrap_or(a.created_at))
        });
        Ok(conversations)
    }

    /// Appends a message, refreshes the snippet and bumps every other
    /// participant's unread counter in one transaction.
    pub fn post_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Message> {
        let seq = self.db.generate_id()?;
        let message = Message {
            id: format!("{seq:016x}"),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            created_at: now,
        };
        let message_key = child_key(conversation_id, &message.id);
        let message_bytes = encode(&message)?;

        (&self.conversations, &self.messages).transaction(|(conversations, messages)| {
            let Some(bytes) = conversations.get(conversation_id.as_bytes())? else {
                return abort(StorageError::not_found("conversation", conversation_id));
            };
            let mut conversation: Conversation = tx_decode(&bytes)?;
            if !conversation.has_participant(sender_id) {
                return abort(StorageError::Conflict(format!(
                    "{sender_id} is not a participant of {conversation_id}"
                )));
            }

            conversation.last_message = Some(snippet(text));
            conversation.last_message_at = Some(now);
            for participant in &conversation.participants {
                if participant != sender_id {
                    *conversation.unread.entry(participant.clone()).or_insert(0) += 1;
                }
            }

            conversations.insert(conversation_id.as_bytes(), tx_encode(&conversation)?)?;
            messages.insert(message_key.as_bytes(), message_bytes.clone())?;
            Ok(())
        })?;
        Ok(message)
    }

    /// Messages in send order.
    pub fn messages_in_conversation(&self, conversation_id: &str) -> StorageResult<Vec<Message>> {
        scan_children(&self.messages, conversation_id)
    }

    pub fn mark_conversation_read(&self, conversation_id: &str, uid: &str) -> StorageResult<()> {
        self.conversations.transaction(|tree| {
            let Some(bytes) = tree.get(conversation_id.as_bytes())? else {
                return abort(StorageError::not_found("conversation", conversation_id));
            };
            let mut conversation: Conversation = tx_decode(&bytes)?;
            if conversation.unread_for(uid) == 0 {
                return Ok(());
            }
            conversation.unread.insert(uid.to_string(), 0);
            tree.insert(conversation_id.as_bytes(), tx_encode(&conversation)?)?;
            Ok(())
        })?;
        Ok(())
    }

    /// Total unread messages across every conversation of `uid`.
    pub fn unread_total(&self, uid: &str) -> StorageResult<u32> {
        Ok(self
            .conversations_for_user(uid)?
            .iter()
            .map(|c| c.unread_for(uid))
            .sum())
    }

    /// Change feed over the conversations collection.
    pub fn watch_conversations(&self) -> Subscriber {
        self.conversations.watch_prefix(vec![])
    }
}
