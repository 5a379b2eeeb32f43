use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use futures::TryStreamExt;
use bson::{bson, doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use tracing::debug;

use async_trait::async_trait;
use civicdesk_common::{
    normalize_email, CivicDeskError, Issue, IssueDraft, IssueId, IssueStatus, Role,
    StaffAssignment, User,
};

use crate::issues::{
    ConditionalOutcome, DateField, IssueFilter, IssueStore, VoterMutation, VoterPredicate,
};
use crate::users::UserStore;
use crate::StoreClient;

const ISSUES_COLLECTION: &str = "issues";
const USERS_COLLECTION: &str = "users";

/// Issue collection backed by MongoDB. Conditional updates run as a single
/// `findOneAndUpdate` whose filter carries the guard, so the compare and the
/// mutation land in one atomic document operation.
pub struct MongoIssueStore {
    collection: Collection<Document>,
}

impl MongoIssueStore {
    pub fn new(client: &StoreClient) -> Self {
        Self {
            collection: client.database().collection(ISSUES_COLLECTION),
        }
    }
}

#[async_trait]
impl IssueStore for MongoIssueStore {
    async fn insert(&self, draft: IssueDraft) -> Result<Issue, CivicDeskError> {
        let result = self
            .collection
            .insert_one(draft_to_doc(&draft))
            .await
            .map_err(db_err)?;
        let oid = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| CivicDeskError::Database("insert returned no ObjectId".to_string()))?;
        let id = IssueId::parse(&oid.to_hex())?;
        Ok(Issue {
            id,
            title: draft.title,
            description: draft.description,
            category: draft.category,
            location: draft.location,
            status: draft.status,
            priority: draft.priority,
            is_boosted: draft.is_boosted,
            created_by: draft.created_by,
            created_at: draft.created_at,
            assigned_staff: StaffAssignment::Unassigned,
            assigned_at: None,
            resolved_at: None,
            upvotes: draft.upvotes,
            upvoters: draft.upvoters,
        })
    }

    async fn find_by_id(&self, id: &IssueId) -> Result<Option<Issue>, CivicDeskError> {
        let found = self
            .collection
            .find_one(doc! { "_id": object_id(id)? })
            .await
            .map_err(db_err)?;
        Ok(found.as_ref().and_then(issue_from_doc))
    }

    async fn list(&self, filter: &IssueFilter) -> Result<Vec<Issue>, CivicDeskError> {
        let mut cursor = self
            .collection
            .find(filter_to_doc(filter))
            .await
            .map_err(db_err)?;
        let mut issues = Vec::new();
        while let Some(raw) = cursor.try_next().await.map_err(db_err)? {
            if let Some(issue) = issue_from_doc(&raw) {
                issues.push(issue);
            }
        }
        Ok(issues)
    }

    async fn count(&self, filter: &IssueFilter) -> Result<u64, CivicDeskError> {
        self.collection
            .count_documents(filter_to_doc(filter))
            .await
            .map_err(db_err)
    }

    async fn conditional_update(
        &self,
        id: &IssueId,
        predicate: VoterPredicate,
        mutation: VoterMutation,
    ) -> Result<ConditionalOutcome, CivicDeskError> {
        let oid = object_id(id)?;

        let mut filter = doc! { "_id": oid };
        let guard = match &predicate {
            VoterPredicate::Absent(voter) => {
                bson!({ "$not": { "$in": [voter.as_str(), normalized_upvoters()] } })
            }
            VoterPredicate::Present(voter) => {
                bson!({ "$in": [voter.as_str(), normalized_upvoters()] })
            }
        };
        filter.insert("$expr", guard);

        // Pipeline update: rewrite the voter set, then recompute the counter
        // from it, keeping upvotes == |upvoters| inside the atomic operation.
        let stages = match &mutation {
            VoterMutation::Add(voter) => vec![
                doc! { "$set": { "upvoters": {
                    "$concatArrays": [ { "$ifNull": ["$upvoters", []] }, [voter.as_str()] ]
                } } },
                doc! { "$set": { "upvotes": { "$size": "$upvoters" } } },
            ],
            VoterMutation::Remove(voter) => vec![
                doc! { "$set": { "upvoters": { "$filter": {
                    "input": { "$ifNull": ["$upvoters", []] },
                    "cond": { "$ne": [
                        { "$toLower": { "$trim": { "input": "$$this" } } },
                        voter.as_str(),
                    ] },
                } } } },
                doc! { "$set": { "upvotes": { "$size": "$upvoters" } } },
            ],
        };

        let updated = self
            .collection
            .find_one_and_update(filter, stages)
            .return_document(ReturnDocument::After)
            .await
            .map_err(db_err)?;

        match updated {
            Some(raw) => Ok(ConditionalOutcome {
                applied: true,
                issue: issue_from_doc(&raw),
            }),
            None => {
                // Guard did not hold (or the id vanished). Surface the store's
                // current view; callers must not fall back to a cached one.
                debug!(issue = %id, "conditional update guard did not match");
                let current = self
                    .collection
                    .find_one(doc! { "_id": oid })
                    .await
                    .map_err(db_err)?;
                Ok(ConditionalOutcome {
                    applied: false,
                    issue: current.as_ref().and_then(issue_from_doc),
                })
            }
        }
    }

    async fn daily_counts(
        &self,
        filter: &IssueFilter,
        field: DateField,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<NaiveDate, u64>, CivicDeskError> {
        let field_key = date_field_key(field);
        let mut match_doc = filter_to_doc(filter);
        match_doc.insert(
            field_key,
            doc! { "$gte": bson_date(from), "$lt": bson_date(to) },
        );

        let pipeline = vec![
            doc! { "$match": match_doc },
            doc! { "$group": {
                "_id": { "$dateToString": {
                    "format": "%Y-%m-%d",
                    "date": format!("${field_key}"),
                    "timezone": "UTC",
                } },
                "count": { "$sum": 1 },
            } },
        ];

        let mut cursor = self.collection.aggregate(pipeline).await.map_err(db_err)?;
        let mut counts = HashMap::new();
        while let Some(raw) = cursor.try_next().await.map_err(db_err)? {
            let Ok(day) = raw.get_str("_id") else { continue };
            let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") else {
                continue;
            };
            counts.insert(date, int_field(&raw, "count").unwrap_or(0).max(0) as u64);
        }
        Ok(counts)
    }

    async fn resolution_spans(
        &self,
        staff: &str,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, CivicDeskError> {
        let filter = IssueFilter {
            assigned_to: Some(normalize_email(staff)),
            status: Some(IssueStatus::Resolved),
            ..Default::default()
        };
        let mut match_doc = filter_to_doc(&filter);
        match_doc.insert("assignedAt", doc! { "$type": "date" });
        match_doc.insert("resolvedAt", doc! { "$type": "date" });

        let mut cursor = self.collection.find(match_doc).await.map_err(db_err)?;
        let mut spans = Vec::new();
        while let Some(raw) = cursor.try_next().await.map_err(db_err)? {
            if let (Some(assigned), Some(resolved)) =
                (date_field(&raw, "assignedAt"), date_field(&raw, "resolvedAt"))
            {
                spans.push((assigned, resolved));
            }
        }
        Ok(spans)
    }
}

/// User collection backed by MongoDB. Emails are stored normalized, so
/// lookups are plain equality on the normalized form.
pub struct MongoUserStore {
    collection: Collection<Document>,
}

impl MongoUserStore {
    pub fn new(client: &StoreClient) -> Self {
        Self {
            collection: client.database().collection(USERS_COLLECTION),
        }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert_if_absent(&self, user: User) -> Result<bool, CivicDeskError> {
        let email = normalize_email(&user.email);
        // Upsert with $setOnInsert: the existence check and the insert are
        // one atomic operation, so concurrent first sign-ins cannot race.
        let result = self
            .collection
            .update_one(
                doc! { "email": email.as_str() },
                doc! { "$setOnInsert": user_to_doc(&user) },
            )
            .upsert(true)
            .await
            .map_err(db_err)?;
        Ok(result.upserted_id.is_some())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CivicDeskError> {
        let found = self
            .collection
            .find_one(doc! { "email": normalize_email(email) })
            .await
            .map_err(db_err)?;
        Ok(found.as_ref().and_then(user_from_doc))
    }

    async fn list(&self) -> Result<Vec<User>, CivicDeskError> {
        self.collect_users(Document::new()).await
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, CivicDeskError> {
        self.collect_users(doc! { "role": role.as_str() }).await
    }
}

impl MongoUserStore {
    async fn collect_users(&self, filter: Document) -> Result<Vec<User>, CivicDeskError> {
        let mut cursor = self.collection.find(filter).await.map_err(db_err)?;
        let mut users = Vec::new();
        while let Some(raw) = cursor.try_next().await.map_err(db_err)? {
            if let Some(user) = user_from_doc(&raw) {
                users.push(user);
            }
        }
        Ok(users)
    }
}

// --- Filter and document mapping ---

fn db_err(e: mongodb::error::Error) -> CivicDeskError {
    CivicDeskError::Database(e.to_string())
}

fn object_id(id: &IssueId) -> Result<ObjectId, CivicDeskError> {
    ObjectId::parse_str(id.as_hex())
        .map_err(|e| CivicDeskError::Validation(format!("invalid issue id: {e}")))
}

fn bson_date(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

fn date_field_key(field: DateField) -> &'static str {
    match field {
        DateField::CreatedAt => "createdAt",
        DateField::ResolvedAt => "resolvedAt",
    }
}

/// Expression yielding the stored voter set with each entry trimmed and
/// lowercased, so membership tests never depend on how entries were written.
fn normalized_upvoters() -> Bson {
    bson!({
        "$map": {
            "input": { "$ifNull": ["$upvoters", []] },
            "in": { "$toLower": { "$trim": { "input": "$$this" } } },
        }
    })
}

/// Expression yielding the assignee email in normalized form, whichever of
/// the two storage shapes the record carries.
fn normalized_assignee() -> Bson {
    bson!({
        "$toLower": { "$trim": { "input": {
            "$cond": [
                { "$eq": [ { "$type": "$assignedStaff" }, "string" ] },
                "$assignedStaff",
                { "$ifNull": [ "$assignedStaff.email", "" ] },
            ]
        } } }
    })
}

fn filter_to_doc(filter: &IssueFilter) -> Document {
    let mut parts: Vec<Document> = Vec::new();
    if let Some(email) = &filter.created_by {
        parts.push(doc! { "$expr": { "$eq": [
            { "$toLower": { "$trim": { "input": { "$ifNull": ["$createdBy", ""] } } } },
            email.as_str(),
        ] } });
    }
    if let Some(email) = &filter.assigned_to {
        parts.push(doc! { "$expr": { "$eq": [ normalized_assignee(), email.as_str() ] } });
    }
    if let Some(email) = &filter.upvoter {
        parts.push(doc! { "$expr": { "$in": [ email.as_str(), normalized_upvoters() ] } });
    }
    if let Some(status) = filter.status {
        parts.push(doc! { "status": status.as_str() });
    }
    if !filter.status_not_in.is_empty() {
        let excluded: Vec<&str> = filter.status_not_in.iter().map(|s| s.as_str()).collect();
        parts.push(doc! { "status": { "$nin": excluded } });
    }
    match parts.len() {
        0 => Document::new(),
        1 => parts.pop().unwrap(),
        _ => doc! { "$and": parts },
    }
}

fn draft_to_doc(draft: &IssueDraft) -> Document {
    let mut raw = doc! {
        "title": draft.title.as_str(),
        "description": draft.description.as_str(),
        "category": draft.category.as_str(),
        "status": draft.status.as_str(),
        "priority": draft.priority.as_str(),
        "isBoosted": draft.is_boosted,
        "createdBy": draft.created_by.as_str(),
        "createdAt": bson_date(draft.created_at),
        "upvotes": draft.upvotes,
        "upvoters": draft.upvoters.clone(),
    };
    if let Some(location) = &draft.location {
        raw.insert("location", location.as_str());
    }
    raw
}

fn user_to_doc(user: &User) -> Document {
    let mut raw = doc! {
        "email": normalize_email(&user.email),
        "name": user.name.as_str(),
        "role": user.role.as_str(),
        "isPremium": user.is_premium,
        "isBlocked": user.is_blocked,
        "createdAt": bson_date(user.created_at),
    };
    if let Some(url) = &user.photo_url {
        raw.insert("photoURL", url.as_str());
    }
    raw
}

fn date_field(raw: &Document, key: &str) -> Option<DateTime<Utc>> {
    raw.get_datetime(key)
        .ok()
        .and_then(|d| DateTime::from_timestamp_millis(d.timestamp_millis()))
}

fn int_field(raw: &Document, key: &str) -> Option<i64> {
    match raw.get(key) {
        Some(Bson::Int32(v)) => Some(*v as i64),
        Some(Bson::Int64(v)) => Some(*v),
        Some(Bson::Double(v)) => Some(*v as i64),
        _ => None,
    }
}

fn assignment_from_doc(raw: &Document) -> StaffAssignment {
    match raw.get("assignedStaff") {
        Some(Bson::String(email)) => StaffAssignment::Assigned(email.clone()),
        Some(Bson::Document(inner)) => inner
            .get_str("email")
            .map(|email| StaffAssignment::Assigned(email.to_string()))
            .unwrap_or_default(),
        _ => StaffAssignment::Unassigned,
    }
}

fn issue_from_doc(raw: &Document) -> Option<Issue> {
    let id = IssueId::parse(&raw.get_object_id("_id").ok()?.to_hex()).ok()?;
    let status = raw.get_str("status").ok()?.parse().ok()?;
    let upvoters = raw
        .get_array("upvoters")
        .map(|arr| {
            arr.iter()
                .filter_map(|b| b.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    Some(Issue {
        id,
        title: raw.get_str("title").unwrap_or_default().to_string(),
        description: raw.get_str("description").unwrap_or_default().to_string(),
        category: raw.get_str("category").unwrap_or_default().to_string(),
        location: raw.get_str("location").ok().map(String::from),
        status,
        priority: raw.get_str("priority").unwrap_or("normal").to_string(),
        is_boosted: raw.get_bool("isBoosted").unwrap_or(false),
        created_by: raw.get_str("createdBy").unwrap_or_default().to_string(),
        created_at: date_field(raw, "createdAt").unwrap_or(DateTime::UNIX_EPOCH),
        assigned_staff: assignment_from_doc(raw),
        assigned_at: date_field(raw, "assignedAt"),
        resolved_at: date_field(raw, "resolvedAt"),
        upvotes: int_field(raw, "upvotes").unwrap_or(0),
        upvoters,
    })
}

fn user_from_doc(raw: &Document) -> Option<User> {
    let role = raw.get_str("role").ok()?.parse().ok()?;
    Some(User {
        email: raw.get_str("email").ok()?.to_string(),
        name: raw.get_str("name").unwrap_or_default().to_string(),
        photo_url: raw.get_str("photoURL").ok().map(String::from),
        role,
        is_premium: raw.get_bool("isPremium").unwrap_or(false),
        is_blocked: raw.get_bool("isBlocked").unwrap_or(false),
        created_at: date_field(raw, "createdAt").unwrap_or(DateTime::UNIX_EPOCH),
    })
}
